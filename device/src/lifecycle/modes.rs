//! Display mode lists and presentation parameters.

use crate::backend::DeviceDriver;
use crate::types::{DepthFormat, DisplayMode, Extent2d, PresentationParameters, WindowId};

/// Smallest fullscreen mode kept after enumeration.
pub const MIN_MODE_SIZE: Extent2d = Extent2d::new(640, 480);

/// Drop modes below [`MIN_MODE_SIZE`], sort the rest and remove duplicates.
pub fn normalize_display_modes(modes: &mut Vec<DisplayMode>) {
    modes.retain(|mode| mode.width >= MIN_MODE_SIZE.width && mode.height >= MIN_MODE_SIZE.height);
    modes.sort_by_key(|mode| (mode.width, mode.height, mode.format, mode.refresh_rate));
    modes.dedup();
}

/// Pick the depth buffer format for an adapter.
///
/// A stencil buffer is only provided when asked for and supported. Without
/// stencil, 16-bit back buffers get a 16-bit depth buffer.
pub fn select_depth_format(
    driver: &dyn DeviceDriver,
    adapter_index: usize,
    want_stencil: bool,
    back_buffer_bits: u32,
) -> DepthFormat {
    if want_stencil && driver.supports_depth_format(adapter_index, DepthFormat::D24S8) {
        return DepthFormat::D24S8;
    }
    if back_buffer_bits > 16 && driver.supports_depth_format(adapter_index, DepthFormat::D24X8) {
        DepthFormat::D24X8
    } else {
        DepthFormat::D16
    }
}

/// Inputs for [`presentation_parameters`].
#[derive(Debug, Clone, Copy)]
pub struct PresentationRequest {
    pub window: WindowId,
    pub windowed: bool,
    /// Fullscreen mode, or the adapter's desktop mode when windowed.
    pub mode: DisplayMode,
    /// Client size of the window (restored size when minimized).
    pub window_size: Extent2d,
    /// Requested back buffer width in windowed mode; zero for none.
    pub back_buffer_width_override: u32,
    pub max_texture_width: u32,
    pub depth_format: DepthFormat,
    pub back_buffer_count: u32,
    pub vsync: bool,
}

/// Fill presentation parameters for create and reset.
pub fn presentation_parameters(request: &PresentationRequest) -> PresentationParameters {
    let (width, height, refresh_rate) = if request.windowed {
        let size = if request.window_size.is_empty() {
            request.mode.extent()
        } else {
            request.window_size
        };
        let override_width = request
            .back_buffer_width_override
            .min(request.max_texture_width);
        if override_width > 0 {
            // Keep the front buffer's aspect ratio.
            let height = (u64::from(override_width) * u64::from(size.height)
                + u64::from(size.width) / 2)
                / u64::from(size.width);
            (override_width, height.max(1) as u32, 0)
        } else {
            (size.width, size.height, 0)
        }
    } else {
        (
            request.mode.width,
            request.mode.height,
            request.mode.refresh_rate,
        )
    };

    PresentationParameters {
        window: request.window,
        windowed: request.windowed,
        back_buffer_width: width,
        back_buffer_height: height,
        back_buffer_format: request.mode.format,
        back_buffer_count: request.back_buffer_count,
        depth_stencil_format: request.depth_format,
        refresh_rate,
        vsync: request.vsync,
    }
}
