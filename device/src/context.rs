//! Per-frame driver of the device subsystem.

use std::sync::Arc;

use crate::error::{DeviceError, DeviceResult};
use crate::lifecycle::DeviceManager;
use crate::proxy::DeviceProxy;
use crate::replay::FlushReport;

/// Frame loop front end for the owning thread.
///
/// Wraps the [`DeviceManager`] with scene bracketing and presentation:
///
/// ```ignore
/// while context.begin_frame()? {
///     context.begin_scene()?;
///     // draw through context.proxy(), possibly from other threads
///     context.end_scene()?;
///     context.end_frame()?;
/// }
/// ```
pub struct RenderContext {
    manager: DeviceManager,
    scene_depth: u32,
    frame: u32,
}

impl RenderContext {
    pub fn new(manager: DeviceManager) -> Self {
        Self {
            manager,
            scene_depth: 0,
            frame: 0,
        }
    }

    pub fn manager(&self) -> &DeviceManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut DeviceManager {
        &mut self.manager
    }

    pub fn proxy(&self) -> &Arc<DeviceProxy> {
        self.manager.proxy()
    }

    /// Index of the current frame.
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Number of open `begin_scene` calls.
    pub fn scene_depth(&self) -> u32 {
        self.scene_depth
    }

    /// Advance the frame counter and make sure the device is usable.
    ///
    /// Blocks while the device is lost. Returns `false` if the host asked to
    /// quit in the meantime.
    pub fn begin_frame(&mut self) -> DeviceResult<bool> {
        self.frame = self.frame.wrapping_add(1);
        self.manager.notify_current_frame(self.frame);
        self.manager.check_device_yield()
    }

    /// Replay recorded commands and present.
    pub fn end_frame(&mut self) -> DeviceResult<FlushReport> {
        let report = self.flush(false)?;
        self.present()?;
        Ok(report)
    }

    /// Open a scene. The outermost call pumps the preload queue first.
    pub fn begin_scene(&mut self) -> DeviceResult<()> {
        if self.scene_depth == 0 {
            let budget = self.manager.config().effective_preload_budget();
            let report = self.manager.preload_queue().pump(budget);
            self.proxy().stats().set_pending_preloads(report.remaining);
            self.proxy().begin_scene()?;
        }
        self.scene_depth += 1;
        Ok(())
    }

    /// Close a scene. The outermost call rolls the frame counters.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidCall`] when no scene is open.
    pub fn end_scene(&mut self) -> DeviceResult<()> {
        match self.scene_depth {
            0 => {
                log::warn!("RenderContext: end_scene without begin_scene");
                Err(DeviceError::InvalidCall(
                    "end_scene without matching begin_scene".to_string(),
                ))
            }
            1 => {
                self.scene_depth = 0;
                self.proxy().end_scene()?;
                self.proxy().stats().roll_frame();
                Ok(())
            }
            _ => {
                self.scene_depth -= 1;
                Ok(())
            }
        }
    }

    /// Unbind streams, textures and shaders, then present.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidCall`] while a scene is open.
    pub fn present(&mut self) -> DeviceResult<()> {
        if self.scene_depth != 0 {
            return Err(DeviceError::InvalidCall(
                "present called inside a scene".to_string(),
            ));
        }
        self.proxy().clear_bindings()?;
        self.proxy().present()
    }

    pub fn flush(&self, stall_if_busy: bool) -> DeviceResult<FlushReport> {
        self.proxy().flush(stall_if_busy)
    }

    pub fn into_manager(self) -> DeviceManager {
        self.manager
    }
}
