//! The object drawing code talks to.
//!
//! [`DeviceProxy`] is shared via `Arc` between the owning thread and any
//! number of producer threads. Each mutating call becomes a
//! [`DeviceCommand`]:
//!
//! - on the owning thread it is checked against the [`StateCache`] and, when
//!   it changes something, issued to the device straight away
//! - on any other thread it is appended to that thread's command buffer and
//!   executed by the next [`DeviceProxy::flush`]
//!
//! While the device is not valid, calls on the owning thread are silently
//! dropped. Device loss is never reported to drawing code; it is latched for
//! the [`DeviceManager`](crate::DeviceManager) to pick up on its next health
//! check.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::backend::RawDevice;
use crate::channel::CommandChannel;
use crate::command::DeviceCommand;
use crate::error::{DeviceError, DeviceResult};
use crate::fence::Fence;
use crate::state_cache::{MAX_SAMPLERS, MAX_STREAMS, StateCache, StateSlot, StateValue};
use crate::stats::DeviceStats;
use crate::types::{
    BufferHandle, ClearFlags, DeviceCapabilities, IndexedDraw, PresentationParameters,
    PrimitiveType, Rect, RenderStateType, ShaderHandle, StreamBinding, SurfaceHandle,
    TextureHandle, VertexDeclHandle, Viewport,
};

/// The device and the settings it was created with.
///
/// Only the lifecycle manager changes these fields. The validity flag lives
/// next to it in [`DeviceProxy`] so it can be read without locking.
#[derive(Default)]
pub(crate) struct DeviceHandle {
    pub(crate) device: Option<Box<dyn RawDevice>>,
    pub(crate) adapter_index: usize,
    pub(crate) mode_index: usize,
    pub(crate) windowed: bool,
    pub(crate) presentation: Option<PresentationParameters>,
}

/// State touched only by the thread currently acting as owner.
pub(crate) struct OwnerState {
    pub(crate) handle: DeviceHandle,
    pub(crate) cache: StateCache,
    render_state_stack: Vec<(RenderStateType, Option<u32>)>,
    pub(crate) screen_copy: Option<SurfaceHandle>,
    pub(crate) last_fence: Option<Fence>,
}

impl OwnerState {
    fn new() -> Self {
        Self {
            handle: DeviceHandle::default(),
            cache: StateCache::new(),
            render_state_stack: Vec::new(),
            screen_copy: None,
            last_fence: None,
        }
    }

    /// Forget every cached value and saved render state. Needed whenever the
    /// device's own state no longer matches what was recorded.
    pub(crate) fn forget_device_state(&mut self) {
        self.cache.invalidate();
        self.render_state_stack.clear();
    }

    /// Drop the scratch surface used for screen copies.
    pub(crate) fn release_screen_copy(&mut self) {
        if let Some(surface) = self.screen_copy.take() {
            if let Some(device) = self.handle.device.as_deref_mut() {
                device.release_surface(surface);
            }
        }
    }
}

/// Thread-safe front end of the device.
pub struct DeviceProxy {
    channel: CommandChannel,
    owner: Mutex<OwnerState>,
    valid: AtomicBool,
    changing_mode: AtomicBool,
    loss_detected: AtomicBool,
    capabilities: RwLock<DeviceCapabilities>,
    stats: DeviceStats,
}

impl DeviceProxy {
    /// Create a proxy owned by the calling thread.
    pub(crate) fn new(command_buffer_capacity: usize) -> Self {
        Self {
            channel: CommandChannel::new(command_buffer_capacity),
            owner: Mutex::new(OwnerState::new()),
            valid: AtomicBool::new(false),
            changing_mode: AtomicBool::new(false),
            loss_detected: AtomicBool::new(false),
            capabilities: RwLock::new(DeviceCapabilities::default()),
            stats: DeviceStats::new(),
        }
    }

    // ========================================================================
    // Queries (any thread)
    // ========================================================================

    /// Whether device calls are legal right now.
    pub fn is_ready(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        *self.capabilities.read()
    }

    /// Free texture memory as of the last create, reset or present.
    pub fn available_texture_memory(&self) -> u64 {
        self.stats.available_texture_memory()
    }

    pub fn stats(&self) -> &DeviceStats {
        &self.stats
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    /// Whether a mode change is in progress.
    pub fn is_changing_mode(&self) -> bool {
        self.changing_mode.load(Ordering::Acquire)
    }

    /// Commands waiting for the next flush.
    pub fn pending_commands(&self) -> usize {
        self.channel.pending()
    }

    /// Current state cache epoch.
    pub fn cache_epoch(&self) -> u32 {
        self.owner.lock().cache.epoch()
    }

    /// Render states saved by `push_render_state` and not yet popped.
    pub fn saved_render_states(&self) -> usize {
        self.owner.lock().render_state_stack.len()
    }

    /// Scratch surface for screen copies, available while the device is valid.
    pub fn screen_copy_surface(&self) -> Option<SurfaceHandle> {
        self.owner.lock().screen_copy
    }

    // ========================================================================
    // Thread notifications
    // ========================================================================

    pub fn notify_secondary_thread(&self) {
        self.channel.notify_secondary_thread();
    }

    pub fn notify_fake_main_thread(&self) {
        self.channel.notify_fake_main_thread();
    }

    pub fn notify_current_frame(&self, frame: u32) {
        self.channel.notify_current_frame(frame);
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Execute or record a command, depending on the calling thread.
    pub fn submit(&self, command: DeviceCommand) -> DeviceResult<()> {
        if !self.channel.is_owner_thread() {
            if let Err(err) = self.channel.record(command) {
                log::warn!("DeviceProxy: dropping recorded command: {}", err);
                return Err(err);
            }
            self.stats.inc_commands_recorded();
            return Ok(());
        }

        if !self.is_ready() {
            log::trace!("DeviceProxy: device not ready, skipping {:?}", command.op());
            return Ok(());
        }
        let mut owner = self.owner.lock();
        self.execute(&mut owner, &command)
            .or_else(|err| self.absorb_loss(err))
    }

    /// Queue a command from the owning thread for the next flush.
    pub fn defer(&self, command: DeviceCommand) -> DeviceResult<()> {
        if !self.channel.is_owner_thread() {
            return Err(DeviceError::NotOwningThread);
        }
        self.channel.defer(command)?;
        self.stats.inc_commands_recorded();
        Ok(())
    }

    pub fn set_render_state(&self, state: RenderStateType, value: u32) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetRenderState { state, value })
    }

    pub fn set_texture_stage_state(&self, stage: u32, state: u32, value: u32) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetTextureStageState {
            stage,
            state,
            value,
        })
    }

    pub fn set_sampler_state(&self, sampler: u32, state: u32, value: u32) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetSamplerState {
            sampler,
            state,
            value,
        })
    }

    pub fn set_texture(&self, stage: u32, texture: Option<TextureHandle>) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetTexture { stage, texture })
    }

    pub fn set_vertex_shader(&self, shader: Option<ShaderHandle>) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetVertexShader(shader))
    }

    pub fn set_pixel_shader(&self, shader: Option<ShaderHandle>) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetPixelShader(shader))
    }

    pub fn set_vertex_declaration(&self, decl: Option<VertexDeclHandle>) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetVertexDeclaration(decl))
    }

    pub fn set_indices(&self, buffer: Option<BufferHandle>) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetIndices(buffer))
    }

    pub fn set_stream_source(&self, stream: u32, binding: StreamBinding) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetStreamSource { stream, binding })
    }

    pub fn set_vertex_shader_constants(
        &self,
        start_register: u32,
        data: &[[f32; 4]],
    ) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetVertexShaderConstants {
            start_register,
            data: data.to_vec(),
        })
    }

    pub fn set_pixel_shader_constants(
        &self,
        start_register: u32,
        data: &[[f32; 4]],
    ) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetPixelShaderConstants {
            start_register,
            data: data.to_vec(),
        })
    }

    pub fn set_viewport(&self, viewport: Viewport) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetViewport(viewport))
    }

    pub fn set_scissor_rect(&self, rect: Rect) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetScissorRect(rect))
    }

    pub fn set_render_target(&self, index: u32, surface: Option<SurfaceHandle>) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetRenderTarget { index, surface })
    }

    pub fn set_depth_stencil_surface(&self, surface: Option<SurfaceHandle>) -> DeviceResult<()> {
        self.submit(DeviceCommand::SetDepthStencilSurface(surface))
    }

    pub fn clear(&self, flags: ClearFlags, color: u32, z: f32, stencil: u32) -> DeviceResult<()> {
        self.submit(DeviceCommand::Clear {
            flags,
            color,
            z,
            stencil,
        })
    }

    pub fn begin_scene(&self) -> DeviceResult<()> {
        self.submit(DeviceCommand::BeginScene)
    }

    pub fn end_scene(&self) -> DeviceResult<()> {
        self.submit(DeviceCommand::EndScene)
    }

    pub fn draw_primitive(
        &self,
        primitive: PrimitiveType,
        start_vertex: u32,
        primitive_count: u32,
    ) -> DeviceResult<()> {
        self.submit(DeviceCommand::DrawPrimitive {
            primitive,
            start_vertex,
            primitive_count,
        })
    }

    pub fn draw_indexed_primitive(&self, draw: IndexedDraw) -> DeviceResult<()> {
        self.submit(DeviceCommand::DrawIndexedPrimitive(draw))
    }

    /// Save the current value of `state` so a later pop restores it.
    pub fn push_render_state(&self, state: RenderStateType) -> DeviceResult<()> {
        self.submit(DeviceCommand::PushRenderState(state))
    }

    pub fn pop_render_state(&self) -> DeviceResult<()> {
        self.submit(DeviceCommand::PopRenderState)
    }

    pub fn present(&self) -> DeviceResult<()> {
        self.submit(DeviceCommand::Present)
    }

    /// Unbind every stream, the index buffer, every texture stage and both
    /// shaders.
    pub fn clear_bindings(&self) -> DeviceResult<()> {
        let caps = self.capabilities();
        for stream in 0..caps.max_streams.min(MAX_STREAMS) {
            self.set_stream_source(stream, StreamBinding::unbound())?;
        }
        self.set_indices(None)?;
        for stage in 0..caps.max_simultaneous_textures.min(MAX_SAMPLERS) {
            self.set_texture(stage, None)?;
        }
        self.set_vertex_shader(None)?;
        self.set_pixel_shader(None)
    }

    // ========================================================================
    // Owner-side execution
    // ========================================================================

    /// Run a command against the device, consulting and updating the cache.
    pub(crate) fn execute(
        &self,
        owner: &mut OwnerState,
        command: &DeviceCommand,
    ) -> DeviceResult<()> {
        match command {
            DeviceCommand::PushRenderState(state) => {
                let saved = match owner.cache.get(StateSlot::RenderState(*state)) {
                    Some(StateValue::Dword(value)) => Some(value),
                    _ => None,
                };
                owner.render_state_stack.push((*state, saved));
                Ok(())
            }
            DeviceCommand::PopRenderState => match owner.render_state_stack.pop() {
                Some((state, Some(value))) => {
                    self.issue(owner, &DeviceCommand::SetRenderState { state, value })
                }
                Some((_, None)) => Ok(()),
                None => {
                    log::warn!("DeviceProxy: render state stack underflow");
                    Ok(())
                }
            },
            command => self.issue(owner, command),
        }
    }

    fn issue(&self, owner: &mut OwnerState, command: &DeviceCommand) -> DeviceResult<()> {
        let Some(device) = owner.handle.device.as_deref_mut() else {
            return Err(DeviceError::NoDevice);
        };

        let cached = command.cached_state();
        if let Some((slot, value)) = cached {
            if !owner.cache.try_set(slot, value) {
                self.stats.inc_cache_hits();
                return Ok(());
            }
        }

        let result = command.apply(device);
        match &result {
            Ok(()) => {
                if matches!(
                    command,
                    DeviceCommand::DrawPrimitive { .. } | DeviceCommand::DrawIndexedPrimitive(_)
                ) {
                    self.stats.record_draw(command.primitive_count());
                } else if matches!(command, DeviceCommand::Present) {
                    self.stats
                        .set_available_texture_memory(device.available_texture_memory());
                }
            }
            Err(_) => {
                // The device state of this slot is unknown now.
                if let Some((slot, _)) = cached {
                    owner.cache.forget(slot);
                }
            }
        }
        result
    }

    /// Swallow device loss, which is handled by the next health check.
    fn absorb_loss(&self, err: DeviceError) -> DeviceResult<()> {
        if err.is_device_loss() {
            log::debug!("DeviceProxy: device loss observed ({})", err);
            self.loss_detected.store(true, Ordering::Release);
            Ok(())
        } else {
            Err(err)
        }
    }

    // ========================================================================
    // Lifecycle hooks
    // ========================================================================

    pub(crate) fn lock_owner(&self) -> MutexGuard<'_, OwnerState> {
        self.owner.lock()
    }

    pub(crate) fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::Release);
    }

    pub(crate) fn note_loss(&self) {
        self.loss_detected.store(true, Ordering::Release);
    }

    /// Consume the loss flag raised by a failed call.
    pub(crate) fn take_loss_detected(&self) -> bool {
        self.loss_detected.swap(false, Ordering::AcqRel)
    }

    /// Refresh caps and memory and recreate the screen copy surface.
    pub(crate) fn update_device_info(&self, owner: &mut OwnerState) {
        let Some(device) = owner.handle.device.as_deref_mut() else {
            return;
        };
        *self.capabilities.write() = device.capabilities();
        self.stats
            .set_available_texture_memory(device.available_texture_memory());

        if owner.screen_copy.is_none() {
            let extent = device.back_buffer_extent();
            match device.create_scratch_surface(extent) {
                Ok(surface) => owner.screen_copy = Some(surface),
                Err(err) => log::warn!("DeviceProxy: no screen copy surface: {}", err),
            }
        }
    }

    /// Claim the mode change flag. Returns `None` if a change is in flight.
    pub(crate) fn begin_mode_change(self: &Arc<Self>) -> Option<ModeChangeGuard> {
        self.changing_mode
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ModeChangeGuard {
                proxy: Arc::clone(self),
            })
    }
}

/// Clears the mode change flag when dropped.
pub(crate) struct ModeChangeGuard {
    proxy: Arc<DeviceProxy>,
}

impl Drop for ModeChangeGuard {
    fn drop(&mut self) {
        self.proxy.changing_mode.store(false, Ordering::Release);
    }
}

static_assertions::assert_impl_all!(DeviceProxy: Send, Sync);
