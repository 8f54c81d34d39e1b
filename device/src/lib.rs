//! # Vellum Device
//!
//! Concurrent command buffering and device lifecycle management for a single
//! stateful graphics device.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`DeviceProxy`] - Thread-safe front end; executes on the owning thread,
//!   records on every other thread
//! - [`StateCache`] - Elides redundant state changes, invalidated in O(1)
//! - [`CommandChannel`] - Per-thread command buffers, replayed by
//!   [`DeviceProxy::flush`]
//! - [`DeviceManager`] - Creation, mode changes, loss detection and reset
//! - [`ResourceRegistry`] - Resources that follow the device through resets
//! - [`PreloadQueue`] - Bounded, time-boxed preloading between frames
//! - [`RenderContext`] - Scene bracketing and presentation per frame
//! - A scriptable [`DummyDriver`] backend for testing
//!
//! ## Example
//!
//! ```
//! use vellum_device::{
//!     DeviceConfig, DeviceCreateRequest, DeviceManager, DummyDriver, Extent2d, HeadlessHost,
//!     RenderContext, RenderStateType, WindowId,
//! };
//!
//! let host = HeadlessHost::new(WindowId(1), Extent2d::new(800, 600));
//! let mut manager = DeviceManager::new(
//!     Box::new(DummyDriver::new()),
//!     Box::new(host),
//!     DeviceConfig::default(),
//! );
//! manager.request_device_create(DeviceCreateRequest::new(WindowId(1)))?;
//!
//! let mut context = RenderContext::new(manager);
//! context.begin_frame()?;
//! context.begin_scene()?;
//! context.proxy().set_render_state(RenderStateType::ZENABLE, 1)?;
//! context.end_scene()?;
//! context.end_frame()?;
//! # Ok::<(), vellum_device::DeviceError>(())
//! ```

pub mod backend;
pub mod channel;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod fence;
pub mod host;
pub mod lifecycle;
pub mod preload;
pub mod proxy;
pub mod registry;
pub mod replay;
pub mod state_cache;
pub mod stats;
pub mod types;

pub use backend::{
    DeviceCreateInfo, DeviceDriver, DummyDevice, DummyDriver, DummyProbe, RawDevice,
};
pub use channel::{CommandChannel, ThreadBinding};
pub use command::{CommandBuffer, CommandEntry, DeviceCommand, OpCode};
pub use config::DeviceConfig;
pub use context::RenderContext;
pub use error::{DeviceError, DeviceResult};
pub use fence::{Fence, FenceStatus};
pub use host::{HeadlessControl, HeadlessHost, HostSignal, HostWindow};
pub use lifecycle::{DeviceCreateRequest, DeviceHealth, DeviceManager, DeviceState};
pub use preload::{PreloadQueue, PreloadReport, Preloadable};
pub use proxy::DeviceProxy;
pub use registry::{
    DeviceResource, LifecyclePass, ResourceHandle, ResourceKind, ResourceRegistry,
};
pub use replay::FlushReport;
pub use state_cache::{StateCache, StateSlot, StateValue};
pub use stats::{DeviceStats, StatsSnapshot};
pub use types::{
    AdapterInfo, AdapterType, BufferHandle, ClearFlags, CooperativeLevel, DepthFormat,
    DeviceCapabilities, DeviceType, DisplayMode, Extent2d, Format, IndexedDraw,
    PresentationParameters, PrimitiveType, Rect, RenderStateType, ShaderHandle, StreamBinding,
    SurfaceHandle, TextureHandle, VertexDeclHandle, Viewport, WindowId,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version. Call once at startup.
pub fn init() {
    log::info!("Vellum Device v{} initialized", VERSION);
}
