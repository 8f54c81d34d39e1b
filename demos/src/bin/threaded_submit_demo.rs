//! # Threaded Submit Demo
//!
//! Worker threads record draw calls through the shared device proxy while the
//! main thread owns the device. Each frame the main thread waits for the
//! workers, replays their buffers and presents.

use std::sync::{Arc, Barrier};
use std::thread;

use clap::Parser;
use vellum_demos::{DemoArgs, DemoDevice};
use vellum_device::{
    DeviceError, DeviceProxy, PrimitiveType, RenderContext, RenderStateType, ShaderHandle,
    TextureHandle,
};

#[derive(Parser, Debug)]
struct Args {
    #[command(flatten)]
    demo: DemoArgs,

    /// Number of worker threads.
    #[arg(long, default_value = "4")]
    workers: u32,

    /// Draw calls per worker and frame.
    #[arg(long, default_value = "256")]
    draws: u32,
}

fn main() -> Result<(), DeviceError> {
    vellum_demos::init_logging();
    vellum_device::init();
    let args = Args::parse();

    let DemoDevice { manager, probe, .. } = DemoDevice::create(&args.demo)?;
    let mut context = RenderContext::new(manager);
    let proxy = Arc::clone(context.proxy());
    let frames = args.demo.frames;
    // Workers record between the two waits; the main thread replays after
    // the second one.
    let barrier = Barrier::new(args.workers as usize + 1);

    let outcome = thread::scope(|scope| {
        for worker in 0..args.workers {
            let (proxy, barrier) = (&proxy, &barrier);
            let draws = args.draws;
            scope.spawn(move || {
                proxy.notify_secondary_thread();
                for _ in 0..frames {
                    barrier.wait();
                    if let Err(err) = record_worker_frame(proxy, worker, draws) {
                        log::warn!("worker {}: {}", worker, err);
                    }
                    barrier.wait();
                }
            });
        }

        let mut outcome = Ok(true);
        for _ in 0..frames {
            barrier.wait();
            barrier.wait();
            if matches!(outcome, Ok(true)) {
                outcome = run_frame(&mut context);
            }
        }
        outcome
    });
    outcome?;

    let stats = context.proxy().stats().snapshot();
    log::info!(
        "{} frames, {} commands recorded, {} replayed, {} cache hits, {} device calls",
        context.frame(),
        stats.commands_recorded,
        stats.commands_replayed,
        stats.cache_hits,
        probe.command_count()
    );
    context.into_manager().release_device();
    Ok(())
}

/// Replay the workers' buffers and present. Returns `false` once the host
/// asked to quit.
fn run_frame(context: &mut RenderContext) -> Result<bool, DeviceError> {
    if !context.begin_frame()? {
        return Ok(false);
    }
    context.begin_scene()?;
    let report = context.flush(false)?;
    log::debug!(
        "Frame {}: replayed {} commands from {} buffers",
        context.frame(),
        report.replayed,
        report.bindings
    );
    context.end_scene()?;
    context.end_frame()?;
    Ok(true)
}

fn record_worker_frame(proxy: &DeviceProxy, worker: u32, draws: u32) -> Result<(), DeviceError> {
    proxy.set_vertex_shader(Some(ShaderHandle(u64::from(worker))))?;
    proxy.set_render_state(RenderStateType::ALPHABLENDENABLE, worker % 2)?;
    for draw in 0..draws {
        proxy.set_texture(0, Some(TextureHandle(u64::from(draw % 4))))?;
        proxy.draw_primitive(PrimitiveType::TriangleStrip, draw * 4, 2)?;
    }
    Ok(())
}
