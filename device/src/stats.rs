//! Device telemetry counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`DeviceStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub draw_calls: u64,
    pub primitives: u64,
    pub last_frame_draw_calls: u64,
    pub last_frame_primitives: u64,
    pub available_texture_memory: u64,

    pub flushes: u64,
    pub commands_recorded: u64,
    pub commands_replayed: u64,
    pub commands_discarded: u64,
    pub replay_errors: u64,
    pub cache_hits: u64,

    pub pending_preloads: u64,
    pub resets: u64,
    pub devices_created: u64,
}

/// Counters for the device subsystem.
///
/// Updated on whichever thread does the work; readable from any thread.
#[derive(Debug, Default)]
pub struct DeviceStats {
    draw_calls: AtomicU64,
    primitives: AtomicU64,
    last_frame_draw_calls: AtomicU64,
    last_frame_primitives: AtomicU64,
    available_texture_memory: AtomicU64,

    flushes: AtomicU64,
    commands_recorded: AtomicU64,
    commands_replayed: AtomicU64,
    commands_discarded: AtomicU64,
    replay_errors: AtomicU64,
    cache_hits: AtomicU64,

    pending_preloads: AtomicU64,
    resets: AtomicU64,
    devices_created: AtomicU64,
}

impl DeviceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_draw(&self, primitives: u32) {
        self.draw_calls.fetch_add(1, Ordering::Relaxed);
        self.primitives
            .fetch_add(u64::from(primitives), Ordering::Relaxed);
    }

    /// Move the live draw counters into the last-frame counters.
    pub fn roll_frame(&self) {
        let draws = self.draw_calls.swap(0, Ordering::Relaxed);
        let primitives = self.primitives.swap(0, Ordering::Relaxed);
        self.last_frame_draw_calls.store(draws, Ordering::Relaxed);
        self.last_frame_primitives
            .store(primitives, Ordering::Relaxed);
    }

    pub fn set_available_texture_memory(&self, bytes: u64) {
        self.available_texture_memory
            .store(bytes, Ordering::Relaxed);
    }

    pub fn available_texture_memory(&self) -> u64 {
        self.available_texture_memory.load(Ordering::Relaxed)
    }

    pub fn inc_flushes(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_recorded(&self) {
        self.commands_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_commands_replayed(&self, count: u64) {
        self.commands_replayed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_commands_discarded(&self, count: u64) {
        self.commands_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_replay_errors(&self) {
        self.replay_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_pending_preloads(&self, pending: usize) {
        self.pending_preloads
            .store(pending as u64, Ordering::Relaxed);
    }

    pub fn inc_resets(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_devices_created(&self) {
        self.devices_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            draw_calls: self.draw_calls.load(Ordering::Relaxed),
            primitives: self.primitives.load(Ordering::Relaxed),
            last_frame_draw_calls: self.last_frame_draw_calls.load(Ordering::Relaxed),
            last_frame_primitives: self.last_frame_primitives.load(Ordering::Relaxed),
            available_texture_memory: self.available_texture_memory.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            commands_recorded: self.commands_recorded.load(Ordering::Relaxed),
            commands_replayed: self.commands_replayed.load(Ordering::Relaxed),
            commands_discarded: self.commands_discarded.load(Ordering::Relaxed),
            replay_errors: self.replay_errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            pending_preloads: self.pending_preloads.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            devices_created: self.devices_created.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_frame() {
        let stats = DeviceStats::new();
        stats.record_draw(10);
        stats.record_draw(5);
        stats.roll_frame();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.draw_calls, 0);
        assert_eq!(snapshot.primitives, 0);
        assert_eq!(snapshot.last_frame_draw_calls, 2);
        assert_eq!(snapshot.last_frame_primitives, 15);
    }

    #[test]
    fn test_counters() {
        let stats = DeviceStats::new();
        stats.inc_flushes();
        stats.add_commands_replayed(3);
        stats.set_available_texture_memory(1024);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.flushes, 1);
        assert_eq!(snapshot.commands_replayed, 3);
        assert_eq!(snapshot.available_texture_memory, 1024);
    }
}
