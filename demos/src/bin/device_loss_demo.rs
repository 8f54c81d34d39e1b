//! # Device Loss Demo
//!
//! Runs a frame loop on the dummy backend and loses the device every
//! `--lose-every` frames. The loop keeps going through loss: drawing is
//! skipped while the device is lost and registered resources are rebuilt
//! once it has been reset.

use clap::Parser;
use vellum_demos::{DemoArgs, DemoDevice, SpriteAtlas};
use vellum_device::{
    ClearFlags, CooperativeLevel, DeviceError, PrimitiveType, RenderContext, RenderStateType,
    Viewport,
};

#[derive(Parser, Debug)]
struct Args {
    #[command(flatten)]
    demo: DemoArgs,

    /// Lose the device every N frames (0 disables).
    #[arg(long, default_value = "20")]
    lose_every: u32,

    /// Number of polls the device stays lost.
    #[arg(long, default_value = "3")]
    lost_polls: usize,
}

fn main() -> Result<(), DeviceError> {
    vellum_demos::init_logging();
    vellum_device::init();
    let args = Args::parse();

    let DemoDevice {
        mut manager, probe, ..
    } = DemoDevice::create(&args.demo)?;

    let atlases: Vec<_> = ["terrain", "units", "interface"]
        .into_iter()
        .map(SpriteAtlas::new)
        .collect();
    for atlas in &atlases {
        manager.register_resource(atlas);
        manager.preload_queue().add_preload(atlas);
    }

    let mut context = RenderContext::new(manager);
    for _ in 0..args.demo.frames {
        let frame = context.frame() + 1;
        if args.lose_every > 0 && frame % args.lose_every == 0 {
            log::info!("Frame {}: simulating device loss", frame);
            probe.script_cooperative_levels(
                std::iter::repeat(CooperativeLevel::Lost)
                    .take(args.lost_polls)
                    .chain([CooperativeLevel::NotReset]),
            );
        }
        if !context.begin_frame()? {
            break;
        }

        context.begin_scene()?;
        let proxy = context.proxy();
        let size = context
            .manager()
            .presentation_parameters()
            .map(|params| params.back_buffer_extent())
            .unwrap_or_default();
        proxy.set_viewport(Viewport::from_extent(size))?;
        proxy.clear(ClearFlags::TARGET | ClearFlags::ZBUFFER, 0xff20_2030, 1.0, 0)?;
        proxy.set_render_state(RenderStateType::ZENABLE, 1)?;
        proxy.set_render_state(RenderStateType::CULLMODE, 1)?;
        for batch in 0..16 {
            proxy.draw_primitive(PrimitiveType::TriangleList, batch * 6, 2)?;
        }
        context.end_scene()?;
        context.end_frame()?;
    }

    let stats = context.proxy().stats().snapshot();
    log::info!(
        "Ran {} frames: {} resets, {} cache hits, {} device calls",
        context.frame(),
        stats.resets,
        stats.cache_hits,
        probe.command_count()
    );
    for atlas in &atlases {
        log::info!("Atlas rebuilt {} times", atlas.generation());
    }

    context.into_manager().release_device();
    Ok(())
}
