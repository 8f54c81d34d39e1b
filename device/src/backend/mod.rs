//! Device backend abstraction.
//!
//! A backend supplies two things:
//!
//! - a [`DeviceDriver`] that enumerates adapters and creates devices
//! - the [`RawDevice`] it creates, which performs the actual device calls
//!
//! The subsystem never talks to a device except through these traits, so the
//! whole lifecycle state machine runs against the [`dummy`] backend in tests.
//!
//! # Available Backends
//!
//! - `dummy`: scriptable in-memory device that records every call

pub mod dummy;

pub use dummy::{DummyDevice, DummyDriver, DummyProbe};

use crate::error::DeviceResult;
use crate::fence::Fence;
use crate::types::{
    AdapterInfo, BufferHandle, ClearFlags, CooperativeLevel, DepthFormat, DeviceCapabilities,
    DeviceType, Extent2d, IndexedDraw, PresentationParameters, PrimitiveType, Rect,
    RenderStateType, ShaderHandle, StreamBinding, SurfaceHandle, TextureHandle,
    VertexDeclHandle, Viewport,
};

/// Everything needed to create a device.
#[derive(Debug, Clone)]
pub struct DeviceCreateInfo<'a> {
    pub adapter_index: usize,
    pub adapter: &'a AdapterInfo,
    pub device_type: DeviceType,
    pub presentation: &'a PresentationParameters,
}

/// Entry point of a backend.
pub trait DeviceDriver: Send {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// List the adapters present in the system, with their raw mode lists.
    fn enumerate_adapters(&mut self) -> DeviceResult<Vec<AdapterInfo>>;

    /// Whether the adapter can use `format` as depth buffer for its windowed
    /// mode.
    fn supports_depth_format(&self, adapter_index: usize, format: DepthFormat) -> bool;

    /// Create a device.
    fn create_device(&mut self, info: &DeviceCreateInfo<'_>) -> DeviceResult<Box<dyn RawDevice>>;
}

/// A stateful graphics device.
///
/// Only the owning thread ever calls into a `RawDevice`.
pub trait RawDevice: Send {
    /// Device name for diagnostics.
    fn name(&self) -> &str;

    // --- health and queries ---

    /// Report whether the device is usable.
    fn test_cooperative_level(&mut self) -> CooperativeLevel;

    /// Reset the swap chain. Fails with `DeviceLost` while still lost.
    fn reset(&mut self, presentation: &PresentationParameters) -> DeviceResult<()>;

    fn capabilities(&self) -> DeviceCapabilities;

    /// Estimated free texture memory in bytes.
    fn available_texture_memory(&self) -> u64;

    fn back_buffer_extent(&self) -> Extent2d;

    /// Issue a completion query covering all work submitted so far.
    fn insert_fence(&mut self) -> Fence;

    // --- surfaces ---

    /// Create a system-memory surface for screen copies.
    fn create_scratch_surface(&mut self, extent: Extent2d) -> DeviceResult<SurfaceHandle>;

    fn release_surface(&mut self, surface: SurfaceHandle);

    // --- cached state ---

    fn set_render_state(&mut self, state: RenderStateType, value: u32) -> DeviceResult<()>;
    fn set_texture_stage_state(&mut self, stage: u32, state: u32, value: u32)
        -> DeviceResult<()>;
    fn set_sampler_state(&mut self, sampler: u32, state: u32, value: u32) -> DeviceResult<()>;
    fn set_texture(&mut self, stage: u32, texture: Option<TextureHandle>) -> DeviceResult<()>;
    fn set_vertex_shader(&mut self, shader: Option<ShaderHandle>) -> DeviceResult<()>;
    fn set_pixel_shader(&mut self, shader: Option<ShaderHandle>) -> DeviceResult<()>;
    fn set_vertex_declaration(&mut self, decl: Option<VertexDeclHandle>) -> DeviceResult<()>;
    fn set_indices(&mut self, buffer: Option<BufferHandle>) -> DeviceResult<()>;
    fn set_stream_source(&mut self, stream: u32, binding: StreamBinding) -> DeviceResult<()>;

    // --- uncached ---

    fn set_vertex_shader_constants(
        &mut self,
        start_register: u32,
        data: &[[f32; 4]],
    ) -> DeviceResult<()>;
    fn set_pixel_shader_constants(
        &mut self,
        start_register: u32,
        data: &[[f32; 4]],
    ) -> DeviceResult<()>;
    fn set_viewport(&mut self, viewport: &Viewport) -> DeviceResult<()>;
    fn set_scissor_rect(&mut self, rect: &Rect) -> DeviceResult<()>;
    fn set_render_target(&mut self, index: u32, surface: Option<SurfaceHandle>)
        -> DeviceResult<()>;
    fn set_depth_stencil_surface(&mut self, surface: Option<SurfaceHandle>) -> DeviceResult<()>;
    fn clear(&mut self, flags: ClearFlags, color: u32, z: f32, stencil: u32) -> DeviceResult<()>;
    fn begin_scene(&mut self) -> DeviceResult<()>;
    fn end_scene(&mut self) -> DeviceResult<()>;
    fn draw_primitive(
        &mut self,
        primitive: PrimitiveType,
        start_vertex: u32,
        primitive_count: u32,
    ) -> DeviceResult<()>;
    fn draw_indexed_primitive(&mut self, draw: &IndexedDraw) -> DeviceResult<()>;
    fn present(&mut self) -> DeviceResult<()>;
}
