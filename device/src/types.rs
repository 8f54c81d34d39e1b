//! Plain data types shared by the device subsystem.

use bitflags::bitflags;

// ============================================================================
// Handles
// ============================================================================

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw handle value.
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

define_handle!(
    /// Opaque handle to a device texture.
    TextureHandle
);
define_handle!(
    /// Opaque handle to a vertex or pixel shader.
    ShaderHandle
);
define_handle!(
    /// Opaque handle to a vertex or index buffer.
    BufferHandle
);
define_handle!(
    /// Opaque handle to a render target, depth-stencil or scratch surface.
    SurfaceHandle
);
define_handle!(
    /// Opaque handle to a vertex declaration.
    VertexDeclHandle
);
define_handle!(
    /// Identity of the host window the device presents into.
    WindowId
);

// ============================================================================
// Geometry
// ============================================================================

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Viewport transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Viewport {
    /// Full-surface viewport with the default depth range.
    pub fn from_extent(extent: Extent2d) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
            min_z: 0.0,
            max_z: 1.0,
        }
    }
}

/// Integer rectangle, right and bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

// ============================================================================
// Draw state
// ============================================================================

/// Identifier of a fixed-function render state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderStateType(pub u32);

impl RenderStateType {
    pub const ZENABLE: Self = Self(7);
    pub const FILLMODE: Self = Self(8);
    pub const ZWRITEENABLE: Self = Self(14);
    pub const ALPHATESTENABLE: Self = Self(15);
    pub const SRCBLEND: Self = Self(19);
    pub const DESTBLEND: Self = Self(20);
    pub const CULLMODE: Self = Self(22);
    pub const ZFUNC: Self = Self(23);
    pub const ALPHAREF: Self = Self(24);
    pub const ALPHABLENDENABLE: Self = Self(27);
    pub const FOGENABLE: Self = Self(28);
    pub const STENCILENABLE: Self = Self(52);
    pub const CLIPPING: Self = Self(136);
    pub const LIGHTING: Self = Self(137);
    pub const COLORWRITEENABLE: Self = Self(168);
}

/// Binding of a vertex buffer to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamBinding {
    pub buffer: Option<BufferHandle>,
    pub offset: u32,
    pub stride: u32,
}

impl StreamBinding {
    pub fn new(buffer: BufferHandle, offset: u32, stride: u32) -> Self {
        Self {
            buffer: Some(buffer),
            offset,
            stride,
        }
    }

    /// A stream with nothing bound.
    pub fn unbound() -> Self {
        Self::default()
    }
}

/// Primitive topology for draw calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveType {
    /// Number of vertices consumed by `count` primitives.
    pub fn vertex_count(self, count: u32) -> u32 {
        match self {
            Self::PointList => count,
            Self::LineList => count * 2,
            Self::LineStrip => count + 1,
            Self::TriangleList => count * 3,
            Self::TriangleStrip | Self::TriangleFan => count + 2,
        }
    }
}

/// Parameters of an indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexedDraw {
    pub primitive: PrimitiveType,
    pub base_vertex: i32,
    pub min_index: u32,
    pub num_vertices: u32,
    pub start_index: u32,
    pub primitive_count: u32,
}

bitflags! {
    /// Which buffers a clear touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const TARGET = 1 << 0;
        const ZBUFFER = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

// ============================================================================
// Formats and modes
// ============================================================================

/// Colour format of a display mode or back buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Format {
    R5G6B5,
    X1R5G5B5,
    A1R5G5B5,
    X8R8G8B8,
    A8R8G8B8,
    A2R10G10B10,
}

impl Format {
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            Self::R5G6B5 | Self::X1R5G5B5 | Self::A1R5G5B5 => 16,
            Self::X8R8G8B8 | Self::A8R8G8B8 | Self::A2R10G10B10 => 32,
        }
    }
}

/// Depth-stencil buffer format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFormat {
    D16,
    D24X8,
    D24S8,
}

impl DepthFormat {
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D24S8)
    }
}

/// A display mode supported by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
    pub format: Format,
}

impl DisplayMode {
    pub const fn new(width: u32, height: u32, refresh_rate: u32, format: Format) -> Self {
        Self {
            width,
            height,
            refresh_rate,
            format,
        }
    }

    pub fn extent(&self) -> Extent2d {
        Extent2d::new(self.width, self.height)
    }
}

// ============================================================================
// Adapters
// ============================================================================

/// Adapter type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterType {
    /// Discrete GPU.
    Discrete,
    /// Integrated GPU.
    Integrated,
    /// Software rasteriser.
    Software,
    /// Reference rasteriser, only used when explicitly requested.
    Reference,
}

/// Capabilities of a device created on an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    pub max_texture_width: u32,
    pub max_texture_height: u32,
    pub max_simultaneous_textures: u32,
    pub max_streams: u32,
    pub max_simultaneous_render_targets: u32,
    pub vertex_shader_version: (u8, u8),
    pub pixel_shader_version: (u8, u8),
    pub hardware_transform: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_width: 4096,
            max_texture_height: 4096,
            max_simultaneous_textures: 8,
            max_streams: 16,
            max_simultaneous_render_targets: 4,
            vertex_shader_version: (3, 0),
            pixel_shader_version: (3, 0),
            hardware_transform: true,
        }
    }
}

/// An enumerated adapter with its display modes.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor_id: u32,
    pub adapter_type: AdapterType,
    pub capabilities: DeviceCapabilities,
    /// Fullscreen modes, sorted and deduplicated after enumeration.
    pub display_modes: Vec<DisplayMode>,
    /// The desktop mode used for windowed rendering.
    pub windowed_mode: DisplayMode,
}

impl AdapterInfo {
    /// Whether the adapter can run a hardware device.
    pub fn is_hardware(&self) -> bool {
        matches!(
            self.adapter_type,
            AdapterType::Discrete | AdapterType::Integrated
        )
    }
}

/// Which rasteriser a device is created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Hardware,
    Reference,
}

// ============================================================================
// Presentation
// ============================================================================

/// How the swap chain is set up on create and reset.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationParameters {
    pub window: WindowId,
    pub windowed: bool,
    pub back_buffer_width: u32,
    pub back_buffer_height: u32,
    pub back_buffer_format: Format,
    pub back_buffer_count: u32,
    pub depth_stencil_format: DepthFormat,
    pub refresh_rate: u32,
    pub vsync: bool,
}

impl PresentationParameters {
    pub fn back_buffer_extent(&self) -> Extent2d {
        Extent2d::new(self.back_buffer_width, self.back_buffer_height)
    }
}

/// Result of asking the device whether it is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooperativeLevel {
    /// The device is fine.
    Ok,
    /// Lost and not resettable yet.
    Lost,
    /// Lost and resettable now.
    NotReset,
    /// The driver faulted.
    DriverInternalError,
    /// Video memory is exhausted.
    OutOfVideoMemory,
}
