//! Device lifecycle management.
//!
//! The [`DeviceManager`] owns the device on the owning thread and drives it
//! through
//!
//! ```text
//! Uninitialized -> Enumerated -> DeviceCreated -> Valid <-> Lost -> Resetting -> Valid
//! ```
//!
//! with `Released` reachable from every state. Around every reset it runs the
//! unmanaged tier of the [`ResourceRegistry`]; around full device release and
//! creation it runs both tiers.

pub mod modes;

use std::sync::Arc;
use std::thread;

use crate::backend::{DeviceCreateInfo, DeviceDriver};
use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult};
use crate::host::{HostSignal, HostWindow};
use crate::preload::PreloadQueue;
use crate::proxy::{DeviceHandle, DeviceProxy};
use crate::registry::{DeviceResource, ResourceHandle, ResourceRegistry};
use crate::types::{
    AdapterInfo, CooperativeLevel, DepthFormat, DeviceType, PresentationParameters, WindowId,
};

use modes::{PresentationRequest, normalize_display_modes, presentation_parameters};

/// Lifecycle state of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Uninitialized,
    Enumerated,
    DeviceCreated,
    Valid,
    Lost,
    Resetting,
    Released,
}

/// Outcome of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceHealth {
    /// The device is usable.
    Operational,
    /// The device is lost and cannot be reset yet.
    Lost,
    /// The device was lost and has just been reset.
    Recovered,
}

/// Parameters of [`DeviceManager::request_device_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCreateRequest {
    pub window: WindowId,
    pub adapter_index: usize,
    pub mode_index: usize,
    pub windowed: bool,
    pub want_stencil: bool,
    pub force_software_ref: bool,
}

impl DeviceCreateRequest {
    /// Windowed device on the first adapter.
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            adapter_index: 0,
            mode_index: 0,
            windowed: true,
            want_stencil: false,
            force_software_ref: false,
        }
    }

    pub fn with_adapter(mut self, adapter_index: usize) -> Self {
        self.adapter_index = adapter_index;
        self
    }

    /// Fullscreen in the given mode.
    pub fn with_fullscreen_mode(mut self, mode_index: usize) -> Self {
        self.mode_index = mode_index;
        self.windowed = false;
        self
    }

    pub fn with_stencil(mut self, want_stencil: bool) -> Self {
        self.want_stencil = want_stencil;
        self
    }

    pub fn with_software_ref(mut self, force_software_ref: bool) -> Self {
        self.force_software_ref = force_software_ref;
        self
    }
}

/// Owns the device and supervises its health.
///
/// Lives on the owning thread. Drawing code on any thread goes through the
/// shared [`DeviceProxy`].
pub struct DeviceManager {
    config: DeviceConfig,
    driver: Box<dyn DeviceDriver>,
    host: Box<dyn HostWindow>,
    proxy: Arc<DeviceProxy>,
    registry: ResourceRegistry,
    preload: Arc<PreloadQueue>,
    state: DeviceState,
    adapters: Vec<AdapterInfo>,
    window: WindowId,
    want_stencil: bool,
    depth_format: DepthFormat,
    back_buffer_width_override: u32,
    paused: bool,
}

impl DeviceManager {
    /// Create a manager owned by the calling thread.
    pub fn new(
        driver: Box<dyn DeviceDriver>,
        host: Box<dyn HostWindow>,
        config: DeviceConfig,
    ) -> Self {
        log::debug!("DeviceManager: using driver '{}'", driver.name());
        let window = host.id();
        Self {
            proxy: Arc::new(DeviceProxy::new(config.command_buffer_capacity)),
            preload: Arc::new(PreloadQueue::new(config.preload_capacity)),
            config,
            driver,
            host,
            registry: ResourceRegistry::new(),
            state: DeviceState::Uninitialized,
            adapters: Vec::new(),
            window,
            want_stencil: false,
            depth_format: DepthFormat::D16,
            back_buffer_width_override: 0,
            paused: false,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn proxy(&self) -> &Arc<DeviceProxy> {
        &self.proxy
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    /// Register a resource. If a device is already running, the resource
    /// is not created retroactively; its owner does that on construction.
    pub fn register_resource<R: DeviceResource + 'static>(
        &mut self,
        resource: &Arc<R>,
    ) -> ResourceHandle {
        self.registry.register(resource)
    }

    pub fn deregister_resource(&mut self, handle: ResourceHandle) -> bool {
        self.registry.deregister(handle)
    }

    pub fn preload_queue(&self) -> &Arc<PreloadQueue> {
        &self.preload
    }

    pub fn adapters(&self) -> &[AdapterInfo] {
        &self.adapters
    }

    pub fn host(&self) -> &dyn HostWindow {
        self.host.as_ref()
    }

    pub fn host_mut(&mut self) -> &mut dyn HostWindow {
        self.host.as_mut()
    }

    pub fn is_device_valid(&self) -> bool {
        self.proxy.is_ready()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn depth_format(&self) -> DepthFormat {
        self.depth_format
    }

    pub fn back_buffer_width_override(&self) -> u32 {
        self.back_buffer_width_override
    }

    /// Presentation parameters the device was last created or reset with.
    pub fn presentation_parameters(&self) -> Option<PresentationParameters> {
        self.proxy.lock_owner().handle.presentation.clone()
    }

    /// Whether the device presents in a window.
    pub fn is_windowed(&self) -> bool {
        self.proxy.lock_owner().handle.windowed
    }

    /// `(adapter_index, mode_index)` of the current device.
    pub fn current_mode(&self) -> (usize, usize) {
        let owner = self.proxy.lock_owner();
        (owner.handle.adapter_index, owner.handle.mode_index)
    }

    pub fn notify_current_frame(&self, frame: u32) {
        self.proxy.notify_current_frame(frame);
    }

    // ========================================================================
    // Enumeration and creation
    // ========================================================================

    /// Enumerate adapters and their display modes.
    ///
    /// # Errors
    ///
    /// Fatal when enumeration fails or no hardware adapter exists.
    pub fn enumerate(&mut self) -> DeviceResult<usize> {
        self.ensure_owner()?;
        if self.state == DeviceState::Released {
            return Err(DeviceError::Released);
        }

        let mut adapters = self.driver.enumerate_adapters().inspect_err(|err| {
            log::error!("DeviceManager: adapter enumeration failed: {}", err);
        })?;
        for adapter in &mut adapters {
            normalize_display_modes(&mut adapter.display_modes);
            log::info!(
                "DeviceManager: adapter '{}' ({:?}), {} display modes",
                adapter.name,
                adapter.adapter_type,
                adapter.display_modes.len()
            );
        }
        if !adapters.iter().any(AdapterInfo::is_hardware) {
            log::error!("DeviceManager: no hardware adapter available");
            return Err(DeviceError::NoAdapter);
        }

        self.adapters = adapters;
        if self.state == DeviceState::Uninitialized {
            self.transition(DeviceState::Enumerated);
        }
        Ok(self.adapters.len())
    }

    /// Create the device, or switch modes if it already runs on the same
    /// adapter and window.
    ///
    /// Creation is attempted `create_attempts` times with a fixed delay in
    /// between.
    pub fn request_device_create(&mut self, request: DeviceCreateRequest) -> DeviceResult<()> {
        self.ensure_owner()?;
        match self.state {
            DeviceState::Released => return Err(DeviceError::Released),
            DeviceState::Uninitialized => {
                self.enumerate()?;
            }
            _ => {}
        }
        self.validate_mode(request.adapter_index, request.mode_index, request.windowed)?;

        let existing = {
            let owner = self.proxy.lock_owner();
            owner.handle.device.is_some().then(|| {
                (
                    owner.handle.adapter_index,
                    owner.handle.presentation.as_ref().map(|params| params.window),
                )
            })
        };
        if let Some((adapter_index, window)) = existing {
            if adapter_index == request.adapter_index && window == Some(request.window) {
                self.want_stencil = request.want_stencil;
                self.request_mode_change(request.mode_index, request.windowed, None)?;
                return Ok(());
            }
            log::info!("DeviceManager: recreating device on a new adapter or window");
            self.teardown();
            self.transition(DeviceState::Enumerated);
        }

        self.want_stencil = request.want_stencil;
        self.window = request.window;
        let presentation = self.fill_presentation_parameters(
            request.adapter_index,
            request.mode_index,
            request.windowed,
        )?;
        if !request.windowed {
            self.host.enter_fullscreen();
        }

        let device_type = if request.force_software_ref {
            DeviceType::Reference
        } else {
            DeviceType::Hardware
        };
        let attempts = self.config.create_attempts;
        let mut last_error = DeviceError::NoDevice;
        let mut created = None;
        for attempt in 1..=attempts {
            let info = DeviceCreateInfo {
                adapter_index: request.adapter_index,
                adapter: &self.adapters[request.adapter_index],
                device_type,
                presentation: &presentation,
            };
            match self.driver.create_device(&info) {
                Ok(device) => {
                    created = Some(device);
                    break;
                }
                Err(err) => {
                    if attempt < attempts {
                        log::warn!(
                            "DeviceManager: device creation attempt {}/{} failed: {}, retrying in {:?}",
                            attempt,
                            attempts,
                            err,
                            self.config.create_retry_delay
                        );
                        thread::sleep(self.config.create_retry_delay);
                    }
                    last_error = err;
                }
            }
        }
        let Some(device) = created else {
            let err = DeviceError::CreationFailed {
                attempts,
                reason: last_error.to_string(),
            };
            log::error!("DeviceManager: {}", err);
            if !request.windowed {
                self.host.leave_fullscreen();
            }
            return Err(err);
        };

        log::info!(
            "DeviceManager: created '{}' ({}x{}, {})",
            device.name(),
            presentation.back_buffer_width,
            presentation.back_buffer_height,
            if request.windowed { "windowed" } else { "fullscreen" }
        );
        {
            let mut owner = self.proxy.lock_owner();
            owner.handle = DeviceHandle {
                device: Some(device),
                adapter_index: request.adapter_index,
                mode_index: request.mode_index,
                windowed: request.windowed,
                presentation: Some(presentation),
            };
            self.proxy.update_device_info(&mut owner);
        }
        self.proxy.stats().inc_devices_created();
        self.transition(DeviceState::DeviceCreated);

        self.registry.create_managed();
        self.registry.create_unmanaged();
        self.proxy.lock_owner().forget_device_state();
        self.proxy.set_valid(true);
        self.paused = false;
        self.transition(DeviceState::Valid);
        Ok(())
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// Per-frame health check.
    ///
    /// Resets the device when it reports it can be reset.
    ///
    /// # Errors
    ///
    /// Driver faults and out-of-memory are fatal in every state: the device
    /// is released and every later call reports [`DeviceError::Released`].
    pub fn check_device(&mut self) -> DeviceResult<DeviceHealth> {
        self.ensure_owner()?;
        match self.state {
            DeviceState::Released => return Err(DeviceError::Released),
            DeviceState::Uninitialized | DeviceState::Enumerated => {
                return Err(DeviceError::NoDevice);
            }
            _ => {}
        }
        if self.proxy.take_loss_detected() {
            log::debug!("DeviceManager: a device call reported loss");
        }

        let level = {
            let mut owner = self.proxy.lock_owner();
            let device = owner
                .handle
                .device
                .as_deref_mut()
                .ok_or(DeviceError::NoDevice)?;
            device.test_cooperative_level()
        };

        match level {
            CooperativeLevel::Ok => {
                if self.state == DeviceState::Valid {
                    Ok(DeviceHealth::Operational)
                } else {
                    self.reset_and_restore(false)?;
                    Ok(DeviceHealth::Recovered)
                }
            }
            CooperativeLevel::Lost => {
                if self.state != DeviceState::Lost {
                    log::info!("DeviceManager: device lost");
                    self.proxy.set_valid(false);
                    self.transition(DeviceState::Lost);
                }
                Ok(DeviceHealth::Lost)
            }
            CooperativeLevel::NotReset => {
                if self.reset_and_restore(false)? {
                    Ok(DeviceHealth::Recovered)
                } else {
                    Ok(DeviceHealth::Lost)
                }
            }
            CooperativeLevel::DriverInternalError => {
                log::error!("DeviceManager: internal driver error, device unusable");
                self.release_device();
                Err(DeviceError::DriverInternalError)
            }
            CooperativeLevel::OutOfVideoMemory => {
                log::error!("DeviceManager: out of video memory, device unusable");
                self.release_device();
                Err(DeviceError::OutOfVideoMemory)
            }
        }
    }

    /// Health check that keeps polling while the device is lost.
    ///
    /// Between polls the host message loop is pumped and the thread sleeps
    /// for `lost_poll_interval`. Returns `Ok(false)` without touching the
    /// device again if the host signals quit.
    pub fn check_device_yield(&mut self) -> DeviceResult<bool> {
        loop {
            match self.check_device()? {
                DeviceHealth::Operational | DeviceHealth::Recovered => return Ok(true),
                DeviceHealth::Lost => {}
            }
            if self.host.pump_messages() == HostSignal::Quit {
                log::info!("DeviceManager: quit requested while the device is lost");
                return Ok(false);
            }
            thread::sleep(self.config.lost_poll_interval);
        }
    }

    /// Reset with the current settings, e.g. after the window was resized.
    ///
    /// Returns `false` when the reset did not happen: a mode change is in
    /// progress, or the device is lost.
    pub fn reset_device(&mut self) -> DeviceResult<bool> {
        self.ensure_owner()?;
        if self.proxy.is_changing_mode() {
            log::warn!("DeviceManager: reset refused during a mode change");
            return Ok(false);
        }
        match self.state {
            DeviceState::Valid => self.reset_and_restore(true),
            DeviceState::Lost => Ok(false),
            DeviceState::Released => Err(DeviceError::Released),
            _ => Err(DeviceError::NoDevice),
        }
    }

    /// Switch display mode and/or between windowed and fullscreen.
    ///
    /// Returns `false` if another mode change is in flight or the device is
    /// lost; a lost device picks up the new settings on its next reset.
    pub fn request_mode_change(
        &mut self,
        mode_index: usize,
        windowed: bool,
        back_buffer_width_override: Option<u32>,
    ) -> DeviceResult<bool> {
        self.ensure_owner()?;
        match self.state {
            DeviceState::Valid | DeviceState::Lost => {}
            DeviceState::Released => return Err(DeviceError::Released),
            _ => return Err(DeviceError::NoDevice),
        }
        let Some(_guard) = self.proxy.begin_mode_change() else {
            log::warn!("DeviceManager: mode change refused, another one is in progress");
            return Ok(false);
        };

        let (adapter_index, was_windowed) = {
            let owner = self.proxy.lock_owner();
            (owner.handle.adapter_index, owner.handle.windowed)
        };
        self.validate_mode(adapter_index, mode_index, windowed)?;

        if was_windowed && !windowed {
            self.host.enter_fullscreen();
        } else if !was_windowed && windowed {
            self.host.leave_fullscreen();
        }
        if let Some(width) = back_buffer_width_override {
            self.back_buffer_width_override = self.clamp_width_override(width, windowed);
        }
        {
            let mut owner = self.proxy.lock_owner();
            owner.handle.mode_index = mode_index;
            owner.handle.windowed = windowed;
        }
        log::info!(
            "DeviceManager: changing to mode {} ({})",
            mode_index,
            if windowed { "windowed" } else { "fullscreen" }
        );

        if self.state == DeviceState::Lost {
            return Ok(false);
        }
        self.reset_and_restore(true)
    }

    /// Change the windowed back buffer width. Zero removes the override.
    ///
    /// The width is clamped to the maximum texture width and ignored in
    /// fullscreen.
    pub fn set_back_buffer_width_override(&mut self, width: u32) -> DeviceResult<bool> {
        let windowed = self.is_windowed();
        let width = self.clamp_width_override(width, windowed);
        if width == self.back_buffer_width_override {
            return Ok(false);
        }
        self.back_buffer_width_override = width;
        match self.state {
            DeviceState::Valid | DeviceState::Lost => {
                let (_, mode_index) = self.current_mode();
                self.request_mode_change(mode_index, windowed, None)
            }
            _ => Ok(false),
        }
    }

    // ========================================================================
    // Pause and release
    // ========================================================================

    /// Release the unmanaged tier while the application is inactive.
    pub fn pause(&mut self) -> DeviceResult<()> {
        self.ensure_owner()?;
        if self.paused || self.state != DeviceState::Valid {
            return Ok(());
        }
        log::info!("DeviceManager: pausing");
        self.release_unmanaged_tier();
        self.paused = true;
        Ok(())
    }

    /// Re-check the device and recreate the unmanaged tier.
    pub fn resume(&mut self) -> DeviceResult<()> {
        self.ensure_owner()?;
        if !self.paused {
            return Ok(());
        }
        log::info!("DeviceManager: resuming");
        match self.check_device()? {
            DeviceHealth::Operational => {
                self.registry.create_unmanaged();
                {
                    let mut owner = self.proxy.lock_owner();
                    self.proxy.update_device_info(&mut owner);
                }
                self.proxy.set_valid(true);
                self.paused = false;
            }
            DeviceHealth::Recovered => self.paused = false,
            // Recovery recreates the tier once the device comes back.
            DeviceHealth::Lost => self.paused = false,
        }
        Ok(())
    }

    /// Release the device and both resource tiers for good.
    pub fn release_device(&mut self) {
        if self.state == DeviceState::Released {
            return;
        }
        self.teardown();
        self.transition(DeviceState::Released);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_owner(&self) -> DeviceResult<()> {
        if self.proxy.channel().is_owner_thread() {
            Ok(())
        } else {
            Err(DeviceError::NotOwningThread)
        }
    }

    fn transition(&mut self, next: DeviceState) {
        if self.state != next {
            log::info!("DeviceManager: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn validate_mode(
        &self,
        adapter_index: usize,
        mode_index: usize,
        windowed: bool,
    ) -> DeviceResult<()> {
        let adapter = self
            .adapters
            .get(adapter_index)
            .ok_or(DeviceError::InvalidAdapter {
                index: adapter_index,
                count: self.adapters.len(),
            })?;
        if !windowed && mode_index >= adapter.display_modes.len() {
            return Err(DeviceError::InvalidMode {
                index: mode_index,
                count: adapter.display_modes.len(),
            });
        }
        Ok(())
    }

    fn clamp_width_override(&self, width: u32, windowed: bool) -> u32 {
        if windowed {
            width.min(self.proxy.capabilities().max_texture_width)
        } else {
            0
        }
    }

    fn fill_presentation_parameters(
        &mut self,
        adapter_index: usize,
        mode_index: usize,
        windowed: bool,
    ) -> DeviceResult<PresentationParameters> {
        self.validate_mode(adapter_index, mode_index, windowed)?;
        let adapter = &self.adapters[adapter_index];
        let mode = if windowed {
            adapter.windowed_mode
        } else {
            adapter.display_modes[mode_index]
        };
        self.depth_format = modes::select_depth_format(
            self.driver.as_ref(),
            adapter_index,
            self.want_stencil,
            mode.format.bits_per_pixel(),
        );
        let window_size = if self.host.is_minimized() {
            self.host.restored_size()
        } else {
            self.host.client_size()
        };

        Ok(presentation_parameters(&PresentationRequest {
            window: self.window,
            windowed,
            mode,
            window_size,
            back_buffer_width_override: self.back_buffer_width_override,
            max_texture_width: adapter.capabilities.max_texture_width,
            depth_format: self.depth_format,
            back_buffer_count: self.config.back_buffer_count(),
            vsync: self.config.vsync,
        }))
    }

    /// Drop everything that does not survive a reset.
    fn release_unmanaged_tier(&mut self) {
        self.proxy.set_valid(false);
        self.proxy.lock_owner().release_screen_copy();
        self.preload.clear();
        self.proxy.stats().set_pending_preloads(0);
        self.registry.release_unmanaged();
    }

    /// Release, reset and recreate the unmanaged tier.
    ///
    /// With `test_cooperative` the device is asked first; if it reports it is
    /// lost nothing is released and `false` is returned.
    fn reset_and_restore(&mut self, test_cooperative: bool) -> DeviceResult<bool> {
        let (adapter_index, mode_index, windowed) = {
            let owner = self.proxy.lock_owner();
            (
                owner.handle.adapter_index,
                owner.handle.mode_index,
                owner.handle.windowed,
            )
        };
        let presentation = self.fill_presentation_parameters(adapter_index, mode_index, windowed)?;

        if test_cooperative {
            let level = {
                let mut owner = self.proxy.lock_owner();
                let device = owner
                    .handle
                    .device
                    .as_deref_mut()
                    .ok_or(DeviceError::NoDevice)?;
                device.test_cooperative_level()
            };
            if level == CooperativeLevel::Lost {
                log::info!("DeviceManager: device lost, reset postponed");
                self.proxy.set_valid(false);
                self.transition(DeviceState::Lost);
                return Ok(false);
            }
        }

        self.transition(DeviceState::Resetting);
        self.release_unmanaged_tier();

        let result = {
            let mut owner = self.proxy.lock_owner();
            let device = owner
                .handle
                .device
                .as_deref_mut()
                .ok_or(DeviceError::NoDevice)?;

            let mut result = device.reset(&presentation);
            while result == Err(DeviceError::DeviceLost) {
                thread::sleep(self.config.reset_poll_interval);
                result = device.reset(&presentation);
            }
            result
        };

        match result {
            Err(err) => {
                log::error!("DeviceManager: device reset failed: {}", err);
                self.transition(DeviceState::Lost);
                Err(err)
            }
            Ok(()) => {
                {
                    let mut owner = self.proxy.lock_owner();
                    owner.handle.presentation = Some(presentation);
                    owner.forget_device_state();
                    owner.last_fence = None;
                    self.proxy.update_device_info(&mut owner);
                }
                self.proxy.stats().inc_resets();
                self.registry.create_unmanaged();
                self.proxy.set_valid(true);
                self.transition(DeviceState::Valid);
                Ok(true)
            }
        }
    }

    /// Release both tiers and drop the device.
    fn teardown(&mut self) {
        let had_device = self.proxy.lock_owner().handle.device.is_some();
        if had_device {
            self.release_unmanaged_tier();
            self.registry.release_managed();
        } else {
            self.proxy.set_valid(false);
        }

        let windowed = {
            let mut owner = self.proxy.lock_owner();
            owner.last_fence = None;
            owner.forget_device_state();
            let windowed = owner.handle.windowed;
            owner.handle = DeviceHandle::default();
            windowed
        };
        if had_device && !windowed {
            self.host.leave_fullscreen();
        }
        self.paused = false;
        log::info!("DeviceManager: device released");
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        if self.state != DeviceState::Released && self.proxy.channel().is_owner_thread() {
            self.release_device();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyDriver, DummyProbe};
    use crate::host::HeadlessHost;
    use crate::types::Extent2d;
    use std::time::Duration;

    fn manager() -> (DeviceManager, DummyProbe) {
        let driver = DummyDriver::new();
        let probe = driver.probe().clone();
        let host = HeadlessHost::new(WindowId(1), Extent2d::new(800, 600));
        let config = DeviceConfig::default()
            .with_create_retry_delay(Duration::ZERO)
            .with_lost_poll_interval(Duration::ZERO)
            .with_reset_poll_interval(Duration::ZERO);
        (
            DeviceManager::new(Box::new(driver), Box::new(host), config),
            probe,
        )
    }

    #[test]
    fn test_enumerate_normalizes_modes() {
        let (mut manager, _probe) = manager();
        assert_eq!(manager.enumerate().unwrap(), 1);
        assert_eq!(manager.state(), DeviceState::Enumerated);
        let modes = &manager.adapters()[0].display_modes;
        assert_eq!(modes.len(), 5);
        assert!(modes.windows(2).all(|pair| pair[0].width <= pair[1].width));
    }

    #[test]
    fn test_enumerate_without_hardware_is_fatal() {
        let (mut manager, probe) = manager();
        let mut adapters = DummyDriver::default_adapters();
        adapters[0].adapter_type = crate::types::AdapterType::Software;
        probe.set_adapters(adapters);
        let err = manager.enumerate().unwrap_err();
        assert_eq!(err, DeviceError::NoAdapter);
        assert!(err.is_fatal());
        assert_eq!(manager.state(), DeviceState::Uninitialized);
    }

    #[test]
    fn test_create_windowed() {
        let (mut manager, probe) = manager();
        manager
            .request_device_create(DeviceCreateRequest::new(WindowId(1)).with_stencil(true))
            .unwrap();
        assert_eq!(manager.state(), DeviceState::Valid);
        assert!(manager.is_device_valid());
        assert_eq!(manager.depth_format(), DepthFormat::D24S8);

        let params = probe.last_presentation().unwrap();
        assert!(params.windowed);
        assert_eq!(params.back_buffer_extent(), Extent2d::new(800, 600));
        assert_eq!(params.back_buffer_count, 2);
    }

    #[test]
    fn test_create_retries_then_fails() {
        let (mut manager, probe) = manager();
        probe.fail_next_creations(10);
        let err = manager
            .request_device_create(DeviceCreateRequest::new(WindowId(1)))
            .unwrap_err();
        assert!(matches!(err, DeviceError::CreationFailed { attempts: 5, .. }));
        assert!(err.is_fatal());
        assert_eq!(probe.creation_attempts(), 5);
        assert_eq!(manager.state(), DeviceState::Enumerated);
    }

    #[test]
    fn test_create_succeeds_after_retries() {
        let (mut manager, probe) = manager();
        probe.fail_next_creations(2);
        manager
            .request_device_create(DeviceCreateRequest::new(WindowId(1)))
            .unwrap();
        assert_eq!(probe.creation_attempts(), 3);
        assert_eq!(manager.state(), DeviceState::Valid);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let (mut manager, _probe) = manager();
        let err = manager
            .request_device_create(DeviceCreateRequest::new(WindowId(1)).with_fullscreen_mode(99))
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidMode { index: 99, .. }));
    }

    #[test]
    fn test_driver_fault_is_fatal() {
        let (mut manager, probe) = manager();
        manager
            .request_device_create(DeviceCreateRequest::new(WindowId(1)))
            .unwrap();
        probe.script_cooperative_levels([CooperativeLevel::OutOfVideoMemory]);
        assert_eq!(manager.check_device(), Err(DeviceError::OutOfVideoMemory));
        assert!(!manager.is_device_valid());
    }

    #[test]
    fn test_reset_retries_while_lost() {
        let (mut manager, probe) = manager();
        manager
            .request_device_create(DeviceCreateRequest::new(WindowId(1)))
            .unwrap();
        probe.script_reset_results([Err(DeviceError::DeviceLost), Err(DeviceError::DeviceLost)]);
        assert!(manager.reset_device().unwrap());
        assert_eq!(probe.reset_calls(), 3);
        assert_eq!(manager.state(), DeviceState::Valid);
    }

    #[test]
    fn test_fullscreen_mode_change() {
        let (mut manager, probe) = manager();
        manager
            .request_device_create(DeviceCreateRequest::new(WindowId(1)))
            .unwrap();
        assert!(manager.request_mode_change(1, false, None).unwrap());
        let params = probe.last_presentation().unwrap();
        assert!(!params.windowed);
        assert_eq!(params.back_buffer_extent(), Extent2d::new(800, 600));
        assert_eq!(manager.current_mode(), (0, 1));
        assert!(!manager.proxy().is_changing_mode());
    }

    #[test]
    fn test_width_override() {
        let (mut manager, probe) = manager();
        manager
            .request_device_create(DeviceCreateRequest::new(WindowId(1)))
            .unwrap();
        assert!(manager.set_back_buffer_width_override(400).unwrap());
        let params = probe.last_presentation().unwrap();
        assert_eq!(params.back_buffer_extent(), Extent2d::new(400, 300));
        assert!(!manager.set_back_buffer_width_override(400).unwrap());
    }

    #[test]
    fn test_release_is_terminal() {
        let (mut manager, _probe) = manager();
        manager
            .request_device_create(DeviceCreateRequest::new(WindowId(1)))
            .unwrap();
        manager.release_device();
        assert_eq!(manager.state(), DeviceState::Released);
        assert!(!manager.is_device_valid());
        assert_eq!(manager.check_device(), Err(DeviceError::Released));
        assert_eq!(
            manager.request_device_create(DeviceCreateRequest::new(WindowId(1))),
            Err(DeviceError::Released)
        );
    }

    #[test]
    fn test_manager_requires_owner_thread() {
        let (mut manager, _probe) = manager();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                assert_eq!(manager.enumerate(), Err(DeviceError::NotOwningThread));
            });
        });
    }
}
