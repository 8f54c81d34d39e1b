//! # Vellum Demos
//!
//! Headless demos of the Vellum device layer, running on the dummy backend.
//!
//! ## Available Demos
//!
//! - `device_loss_demo` - Frame loop that loses and recovers the device
//! - `threaded_submit_demo` - Worker threads recording draws replayed per frame

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use clap::Parser;
use vellum_device::{
    DeviceConfig, DeviceCreateRequest, DeviceManager, DeviceResource, DeviceResult, DummyDriver,
    DummyProbe, Extent2d, HeadlessControl, HeadlessHost, Preloadable, ResourceKind, WindowId,
};

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEMO_WINDOW: WindowId = WindowId(1);

/// Command line arguments shared by every demo.
#[derive(Parser, Debug, Clone)]
#[command(
    about = "Vellum device layer demo",
    long_about = "Runs a headless frame loop on the dummy device backend.\n\n\
        EXAMPLES:\n\
          # Run 120 frames in a 1280x720 window\n\
          ./device_loss_demo --frames 120 --width 1280 --height 720\n\
        \n\
          # Start fullscreen in the second display mode\n\
          ./device_loss_demo --fullscreen --mode 1",
    version
)]
pub struct DemoArgs {
    /// Number of frames to run before exiting.
    #[arg(long, default_value = "60")]
    pub frames: u32,

    /// Initial window width in pixels.
    #[arg(long, default_value = "1024")]
    pub width: u32,

    /// Initial window height in pixels.
    #[arg(long, default_value = "768")]
    pub height: u32,

    /// Start in fullscreen.
    #[arg(long)]
    pub fullscreen: bool,

    /// Display mode index used in fullscreen.
    #[arg(long, default_value = "0")]
    pub mode: usize,

    /// Request a stencil buffer.
    #[arg(long)]
    pub stencil: bool,

    /// Use the larger editor preload budget.
    #[arg(long)]
    pub editor: bool,

    /// Disable vertical sync.
    #[arg(long)]
    pub no_vsync: bool,
}

impl DemoArgs {
    pub fn config(&self) -> DeviceConfig {
        DeviceConfig::default()
            .with_editor_mode(self.editor)
            .with_vsync(!self.no_vsync)
    }

    pub fn create_request(&self) -> DeviceCreateRequest {
        let request = DeviceCreateRequest::new(DEMO_WINDOW).with_stencil(self.stencil);
        if self.fullscreen {
            request.with_fullscreen_mode(self.mode)
        } else {
            request
        }
    }
}

/// Initialize logging for a demo binary. `RUST_LOG` overrides the default.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// A device manager on the dummy backend.
pub struct DemoDevice {
    pub manager: DeviceManager,
    pub probe: DummyProbe,
    pub host: HeadlessControl,
}

impl DemoDevice {
    pub fn create(args: &DemoArgs) -> DeviceResult<Self> {
        let driver = DummyDriver::new();
        let probe = driver.probe().clone();
        let host = HeadlessHost::new(DEMO_WINDOW, Extent2d::new(args.width, args.height));
        let control = host.control();

        let mut manager = DeviceManager::new(Box::new(driver), Box::new(host), args.config());
        manager.request_device_create(args.create_request())?;
        log::info!(
            "Demo device ready: {:?}",
            manager.presentation_parameters().map(|p| p.back_buffer_extent())
        );
        Ok(Self {
            manager,
            probe,
            host: control,
        })
    }
}

/// A texture atlas that follows the device through resets and is preloaded
/// before first use.
#[derive(Debug)]
pub struct SpriteAtlas {
    name: String,
    generation: AtomicU32,
}

impl SpriteAtlas {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            generation: AtomicU32::new(0),
        })
    }

    /// Number of times the render target copy has been rebuilt.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Relaxed)
    }
}

impl DeviceResource for SpriteAtlas {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn release_unmanaged(&self) {
        log::debug!("SpriteAtlas '{}': releasing render target copy", self.name);
    }

    fn create_unmanaged(&self) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("SpriteAtlas '{}': render target copy #{}", self.name, generation);
    }
}

impl Preloadable for SpriteAtlas {
    fn make_resident(&self) {
        log::trace!("SpriteAtlas '{}': resident", self.name);
    }
}
