//! Multi-threaded submission tests.
//!
//! The test thread creates the manager and is therefore the owning thread.
//! Every other thread records into its own binding and is replayed by
//! [`DeviceProxy::flush`](vellum_device::DeviceProxy::flush).
//!
//! # Test Categories
//!
//! - **Ordering Tests**: FIFO per thread, registration order across threads
//! - **Concurrency Tests**: recording never waits for a running flush
//! - **Fake Main Thread Tests**: direct execution from a stand-in thread
//! - **Capacity Tests**: bounded per-thread buffers

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rstest::rstest;

use common::{TestRig, fast_config};
use vellum_device::{
    DeviceCommand, DeviceError, OpCode, PrimitiveType, RenderStateType, TextureHandle,
};

fn draw(start_vertex: u32) -> DeviceCommand {
    DeviceCommand::DrawPrimitive {
        primitive: PrimitiveType::TriangleList,
        start_vertex,
        primitive_count: 1,
    }
}

/// Start vertices of every executed draw call, in execution order.
fn executed_draws(rig: &TestRig) -> Vec<u32> {
    rig.probe
        .commands()
        .into_iter()
        .filter_map(|command| match command {
            DeviceCommand::DrawPrimitive { start_vertex, .. } => Some(start_vertex),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Ordering Tests
// ============================================================================

#[rstest]
#[case::single(1, 100)]
#[case::four(4, 250)]
#[case::many(8, 64)]
fn test_each_thread_replays_in_fifo_order(#[case] threads: u32, #[case] per_thread: u32) {
    let rig = TestRig::new();
    let proxy = Arc::clone(rig.manager.proxy());

    thread::scope(|scope| {
        for t in 0..threads {
            let proxy = &proxy;
            scope.spawn(move || {
                proxy.notify_secondary_thread();
                for i in 0..per_thread {
                    proxy.submit(draw(t * 10_000 + i)).unwrap();
                }
            });
        }
    });
    assert_eq!(rig.probe.count_op(OpCode::DrawPrimitive), 0);
    assert_eq!(proxy.pending_commands(), (threads * per_thread) as usize);

    let report = proxy.flush(false).unwrap();
    assert_eq!(report.replayed, (threads * per_thread) as usize);
    assert_eq!(report.bindings, threads as usize);
    assert_eq!(proxy.pending_commands(), 0);

    let executed = executed_draws(&rig);
    assert_eq!(executed.len(), (threads * per_thread) as usize);
    for t in 0..threads {
        let from_thread: Vec<u32> = executed
            .iter()
            .copied()
            .filter(|vertex| vertex / 10_000 == t)
            .collect();
        let expected: Vec<u32> = (0..per_thread).map(|i| t * 10_000 + i).collect();
        assert_eq!(from_thread, expected, "thread {} replayed out of order", t);
    }
}

#[test]
fn test_threads_replay_in_registration_order_then_deferred() {
    let rig = TestRig::new();
    let proxy = Arc::clone(rig.manager.proxy());

    proxy.defer(draw(999)).unwrap();
    for t in 0..3 {
        thread::scope(|scope| {
            scope.spawn(|| {
                proxy.submit(draw(t * 10)).unwrap();
                proxy.submit(draw(t * 10 + 1)).unwrap();
            });
        });
    }

    proxy.flush(false).unwrap();
    assert_eq!(executed_draws(&rig), vec![0, 1, 10, 11, 20, 21, 999]);
}

#[test]
fn test_last_replayed_state_wins_in_cache() {
    let rig = TestRig::new();
    let proxy = Arc::clone(rig.manager.proxy());

    for value in [1, 2] {
        thread::scope(|scope| {
            scope.spawn(|| {
                proxy.set_render_state(RenderStateType::CULLMODE, value).unwrap();
            });
        });
    }
    proxy.flush(false).unwrap();
    assert_eq!(rig.probe.count_op(OpCode::SetRenderState), 2);

    // The cache holds the value replayed last.
    proxy.set_render_state(RenderStateType::CULLMODE, 2).unwrap();
    assert_eq!(rig.probe.count_op(OpCode::SetRenderState), 2);
    proxy.set_render_state(RenderStateType::CULLMODE, 1).unwrap();
    assert_eq!(rig.probe.count_op(OpCode::SetRenderState), 3);
}

#[test]
fn test_redundant_recorded_state_elided_on_replay() {
    let rig = TestRig::new();
    let proxy = Arc::clone(rig.manager.proxy());
    let first = Some(TextureHandle(1));
    let second = Some(TextureHandle(2));

    thread::scope(|scope| {
        scope.spawn(|| {
            proxy.set_texture(0, first).unwrap();
            proxy.set_texture(0, first).unwrap();
            proxy.set_texture(0, second).unwrap();
            proxy.set_texture(0, second).unwrap();
        });
    });
    let report = proxy.flush(false).unwrap();

    assert_eq!(report.replayed, 4);
    assert_eq!(rig.probe.count_op(OpCode::SetTexture), 2);
    assert!(proxy.stats().snapshot().cache_hits >= 2);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn test_recording_does_not_wait_for_flush() {
    let rig = TestRig::new();
    let proxy = Arc::clone(rig.manager.proxy());
    let probe = rig.probe.clone();

    thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..50 {
                proxy.submit(draw(i)).unwrap();
            }
        });
    });
    probe.set_command_delay(Duration::from_millis(2));

    thread::scope(|scope| {
        let recorder = scope.spawn(|| {
            while probe.command_count() == 0 {
                thread::yield_now();
            }
            let start = Instant::now();
            for i in 0..10 {
                proxy.submit(draw(1_000 + i)).unwrap();
            }
            (start.elapsed(), probe.command_count())
        });

        let report = proxy.flush(false).unwrap();
        assert_eq!(report.replayed, 50);

        let (elapsed, executed_when_done) = recorder.join().unwrap();
        assert!(
            executed_when_done < 50,
            "recording finished only after the flush drained ({} executed)",
            executed_when_done
        );
        assert!(elapsed < Duration::from_millis(50));
    });

    // Recorded after the flush started, picked up by the next one.
    probe.set_command_delay(Duration::ZERO);
    assert_eq!(proxy.pending_commands(), 10);
    assert_eq!(proxy.flush(false).unwrap().replayed, 10);
    assert_eq!(executed_draws(&rig).len(), 60);
}

#[test]
fn test_flush_stalls_until_fence_signaled() {
    let rig = TestRig::new();
    let proxy = Arc::clone(rig.manager.proxy());
    let probe = rig.probe.clone();
    probe.set_hold_fences(true);

    thread::scope(|scope| {
        scope.spawn(|| {
            while probe.fences_issued() == 0 {
                thread::yield_now();
            }
            thread::sleep(Duration::from_millis(5));
            probe.signal_fences();
        });

        let start = Instant::now();
        proxy.flush(true).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    });
}

#[test]
fn test_flush_requires_owner_thread() {
    let rig = TestRig::new();
    let proxy = Arc::clone(rig.manager.proxy());
    thread::scope(|scope| {
        scope.spawn(|| {
            assert_eq!(proxy.flush(false).unwrap_err(), DeviceError::NotOwningThread);
            assert_eq!(
                proxy.defer(draw(0)).unwrap_err(),
                DeviceError::NotOwningThread
            );
        });
    });
}

// ============================================================================
// Fake Main Thread Tests
// ============================================================================

#[test]
fn test_fake_main_thread_executes_directly() {
    let rig = TestRig::new();
    let proxy = Arc::clone(rig.manager.proxy());

    thread::scope(|scope| {
        scope.spawn(|| {
            proxy.notify_fake_main_thread();
            proxy.set_render_state(RenderStateType::LIGHTING, 0).unwrap();
            proxy.draw_primitive(PrimitiveType::TriangleList, 0, 2).unwrap();
            assert_eq!(rig.probe.count_op(OpCode::DrawPrimitive), 1);
            proxy.channel().clear_fake_main_thread();

            proxy.draw_primitive(PrimitiveType::TriangleList, 0, 2).unwrap();
            assert_eq!(rig.probe.count_op(OpCode::DrawPrimitive), 1);
        });
    });

    assert_eq!(proxy.pending_commands(), 1);
    proxy.flush(false).unwrap();
    assert_eq!(rig.probe.count_op(OpCode::DrawPrimitive), 2);
}

// ============================================================================
// Capacity Tests
// ============================================================================

#[test]
fn test_full_buffer_rejects_until_flushed() {
    let rig = TestRig::with_config(fast_config().with_command_buffer_capacity(4));
    let proxy = Arc::clone(rig.manager.proxy());

    let record = |count: u32| {
        thread::scope(|scope| {
            scope
                .spawn(|| (0..count).map(|i| proxy.submit(draw(i))).collect::<Vec<_>>())
                .join()
                .unwrap()
        })
    };

    let results = record(5);
    assert!(results[..4].iter().all(Result::is_ok));
    assert_eq!(
        results[4],
        Err(DeviceError::CommandBufferFull { capacity: 4 })
    );

    proxy.flush(false).unwrap();
    assert!(record(4).iter().all(Result::is_ok));
}

#[test]
fn test_recorded_while_lost_is_discarded() {
    let mut rig = TestRig::new();
    let proxy = Arc::clone(rig.manager.proxy());
    rig.probe
        .script_cooperative_levels([vellum_device::CooperativeLevel::Lost]);
    rig.manager.check_device().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..3 {
                proxy.submit(draw(i)).unwrap();
            }
        });
    });
    let report = proxy.flush(false).unwrap();

    assert_eq!(report.discarded, 3);
    assert_eq!(report.replayed, 0);
    assert_eq!(rig.probe.count_op(OpCode::DrawPrimitive), 0);
    assert_eq!(proxy.pending_commands(), 0);
}
