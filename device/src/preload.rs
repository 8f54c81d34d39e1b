//! Time-boxed resource preloading.
//!
//! Asset code queues resources it expects to draw soon; the owning thread
//! makes a few of them resident at the start of each frame. The queue is
//! bounded and drops its oldest entries first. An entry whose only remaining
//! reference is the queue's own is dropped instead of loaded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A resource that can be made resident ahead of use.
pub trait Preloadable: Send + Sync {
    /// Touch the resource so the driver uploads it.
    fn make_resident(&self);
}

/// What a single [`PreloadQueue::pump`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub preloaded: usize,
    pub dropped: usize,
    pub remaining: usize,
    /// The queue was busy and the pump stopped early.
    pub skipped: bool,
}

/// Bounded FIFO of resources awaiting preload.
pub struct PreloadQueue {
    entries: Mutex<VecDeque<Arc<dyn Preloadable>>>,
    capacity: usize,
}

impl PreloadQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Queue a resource. The queue holds its own reference until the entry
    /// is pumped or trimmed.
    pub fn add_preload<R: Preloadable + 'static>(&self, resource: &Arc<R>) {
        let entry: Arc<dyn Preloadable> = Arc::clone(resource) as Arc<dyn Preloadable>;
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        let overflow = entries.len().saturating_sub(self.capacity);
        if overflow > 0 {
            entries.drain(..overflow);
            log::trace!("PreloadQueue: trimmed {} oldest entries", overflow);
        }
    }

    /// Make queued resources resident until `time_limit` has elapsed or the
    /// queue is empty.
    ///
    /// Never waits for the queue lock; if a producer holds it the pump stops
    /// for this frame. The lock is released before each `make_resident`, so a
    /// resource may queue further preloads while being made resident.
    pub fn pump(&self, time_limit: Duration) -> PreloadReport {
        let mut report = PreloadReport::default();
        let start = Instant::now();
        while start.elapsed() < time_limit {
            let Some(mut entries) = self.entries.try_lock() else {
                report.skipped = true;
                break;
            };
            let Some(entry) = entries.pop_front() else {
                break;
            };
            drop(entries);

            if Arc::strong_count(&entry) == 1 {
                report.dropped += 1;
            } else {
                entry.make_resident();
                report.preloaded += 1;
            }
        }
        report.remaining = self.pending();

        if report.preloaded > 0 || report.dropped > 0 {
            log::trace!(
                "PreloadQueue: preloaded {}, dropped {}, {} remaining",
                report.preloaded,
                report.dropped,
                report.remaining
            );
        }
        report
    }

    /// Drop every queued entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn pending(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

static_assertions::assert_impl_all!(PreloadQueue: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Texture {
        id: u32,
        resident: AtomicU32,
    }

    impl Preloadable for Texture {
        fn make_resident(&self) {
            self.resident.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn texture(id: u32) -> Arc<Texture> {
        Arc::new(Texture {
            id,
            ..Default::default()
        })
    }

    #[test]
    fn test_pump_makes_resident() {
        let queue = PreloadQueue::new(8);
        let a = texture(0);
        let b = texture(1);
        queue.add_preload(&a);
        queue.add_preload(&b);

        let report = queue.pump(Duration::from_secs(1));
        assert_eq!(report.preloaded, 2);
        assert_eq!(report.remaining, 0);
        assert_eq!(a.resident.load(Ordering::Relaxed), 1);
        assert_eq!(Arc::strong_count(&a), 1);
        assert_eq!(b.id, 1);
    }

    #[test]
    fn test_orphaned_entries_dropped() {
        let queue = PreloadQueue::new(8);
        let kept = texture(0);
        queue.add_preload(&texture(1));
        queue.add_preload(&kept);

        let report = queue.pump(Duration::from_secs(1));
        assert_eq!(report.dropped, 1);
        assert_eq!(report.preloaded, 1);
    }

    #[test]
    fn test_zero_budget_does_nothing() {
        let queue = PreloadQueue::new(8);
        let a = texture(0);
        queue.add_preload(&a);
        let report = queue.pump(Duration::ZERO);
        assert_eq!(report.preloaded, 0);
        assert_eq!(report.remaining, 1);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let queue = PreloadQueue::new(3);
        let textures: Vec<_> = (0..5).map(texture).collect();
        for texture in &textures {
            queue.add_preload(texture);
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(Arc::strong_count(&textures[0]), 1);
        assert_eq!(Arc::strong_count(&textures[1]), 1);
        assert_eq!(Arc::strong_count(&textures[2]), 2);

        queue.pump(Duration::from_secs(1));
        let resident: Vec<u32> = textures
            .iter()
            .map(|texture| texture.resident.load(Ordering::Relaxed))
            .collect();
        assert_eq!(resident, vec![0, 0, 1, 1, 1]);
    }

    /// Queues a follow-up resource from inside `make_resident`.
    struct Chained {
        queue: Arc<PreloadQueue>,
        next: Arc<Texture>,
    }

    impl Preloadable for Chained {
        fn make_resident(&self) {
            self.queue.add_preload(&self.next);
        }
    }

    #[test]
    fn test_make_resident_can_queue_more() {
        let queue = Arc::new(PreloadQueue::new(8));
        let next = texture(1);
        let chained = Arc::new(Chained {
            queue: Arc::clone(&queue),
            next: Arc::clone(&next),
        });
        queue.add_preload(&chained);

        let report = queue.pump(Duration::from_secs(1));
        assert_eq!(report.preloaded, 2);
        assert_eq!(report.remaining, 0);
        assert!(!report.skipped);
        assert_eq!(next.resident.load(Ordering::Relaxed), 1);
    }

    /// Blocks in `make_resident` until released.
    struct Gate {
        entered: std::sync::mpsc::Sender<()>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl Preloadable for Gate {
        fn make_resident(&self) {
            let _ = self.entered.send(());
            let _ = self.release.lock().recv();
        }
    }

    #[test]
    fn test_producers_not_blocked_by_slow_upload() {
        let queue = Arc::new(PreloadQueue::new(8));
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let gate = Arc::new(Gate {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        });
        queue.add_preload(&gate);

        let pumper = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pump(Duration::from_secs(5)))
        };
        entered_rx.recv().unwrap();

        // The pump is inside make_resident; queueing must not block.
        let late = texture(2);
        queue.add_preload(&late);
        assert_eq!(queue.pending(), 1);

        release_tx.send(()).unwrap();
        let report = pumper.join().unwrap();
        assert_eq!(report.preloaded + report.remaining, 2);
        assert!(report.preloaded >= 1);
    }

    #[test]
    fn test_clear() {
        let queue = PreloadQueue::new(4);
        let a = texture(0);
        queue.add_preload(&a);
        queue.clear();
        assert_eq!(queue.pending(), 0);
        assert_eq!(Arc::strong_count(&a), 1);
    }
}
