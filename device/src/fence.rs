//! CPU-GPU completion queries.
//!
//! A [`Fence`] is issued by the device at the end of every flush. The replay
//! engine can block on it when the caller asks to stall.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Status of a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The work before the fence is still in flight.
    Pending,
    /// The device has finished the work before the fence.
    Signaled,
}

/// Completion query shared between a device and its callers.
///
/// Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct Fence {
    signaled: Arc<AtomicBool>,
}

impl Fence {
    /// Create a fence the device will signal later.
    pub fn new_pending() -> Self {
        Self {
            signaled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a fence that is already complete.
    pub fn new_signaled() -> Self {
        Self {
            signaled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn status(&self) -> FenceStatus {
        if self.signaled.load(Ordering::Acquire) {
            FenceStatus::Signaled
        } else {
            FenceStatus::Pending
        }
    }

    /// Non-blocking completion check.
    pub fn is_signaled(&self) -> bool {
        self.status() == FenceStatus::Signaled
    }

    /// Block until the fence is signaled. No timeout.
    pub fn wait(&self) {
        let mut spins = 0u32;
        while !self.signaled.load(Ordering::Acquire) {
            if spins < 64 {
                std::hint::spin_loop();
                spins += 1;
            } else {
                std::thread::yield_now();
            }
        }
    }

    /// Wait with a timeout. Returns `true` if the fence was signaled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.signaled.load(Ordering::Acquire) {
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::yield_now();
        }
        true
    }

    /// Mark the fenced work complete. Called by device implementations.
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::new_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_pending() {
        let fence = Fence::new_pending();
        assert_eq!(fence.status(), FenceStatus::Pending);
        assert!(!fence.is_signaled());
    }

    #[test]
    fn test_fence_signaled() {
        let fence = Fence::new_signaled();
        assert!(fence.is_signaled());
        fence.wait();
    }

    #[test]
    fn test_fence_signal_and_wait() {
        let fence = Fence::new_pending();

        let fence_clone = fence.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            fence_clone.signal();
        });

        fence.wait();
        assert!(fence.is_signaled());
    }

    #[test]
    fn test_fence_wait_timeout() {
        let fence = Fence::new_pending();
        assert!(!fence.wait_timeout(Duration::from_millis(10)));
    }
}
