//! Replay of recorded commands on the owning thread.

use crate::error::{DeviceError, DeviceResult};
use crate::proxy::DeviceProxy;

/// What a single [`DeviceProxy::flush`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Bindings that had at least one entry.
    pub bindings: usize,
    /// Entries executed (including ones the state cache elided).
    pub replayed: usize,
    /// Entries dropped because the device was not valid.
    pub discarded: usize,
    /// Entries recorded more than one frame before the flush.
    pub stale: usize,
    /// Entries whose device call failed.
    pub errors: usize,
}

impl DeviceProxy {
    /// Replay every recorded command on the device.
    ///
    /// Secondary threads are drained in registration order, then the owning
    /// thread's deferred buffer; each buffer replays in FIFO order. Each
    /// buffer's lock is held only while its entries are swapped out, so
    /// producers keep recording while the flush runs. Everything recorded
    /// before the flush started has executed when it returns.
    ///
    /// With `stall_if_busy` the call also waits, without timeout, for the
    /// completion query issued at the end of the flush.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotOwningThread`] when called from any thread
    /// other than the owner. Failed replayed calls are logged and counted,
    /// never returned.
    pub fn flush(&self, stall_if_busy: bool) -> DeviceResult<FlushReport> {
        if !self.channel().is_owner_thread() {
            return Err(DeviceError::NotOwningThread);
        }

        let mut report = FlushReport::default();
        let current_frame = self.channel().current_frame();
        let ready = self.is_ready();
        let mut owner = self.lock_owner();
        let ready = ready && owner.handle.device.is_some();

        for binding in self.channel().replay_order() {
            let batch = binding.take_batch();
            if batch.is_empty() {
                continue;
            }
            report.bindings += 1;

            if !ready {
                log::debug!(
                    "Replay: device not ready, discarding {} entries from {:?}",
                    batch.len(),
                    binding.thread_id()
                );
                report.discarded += batch.len();
                binding.recycle(batch);
                continue;
            }

            for entry in &batch {
                if current_frame.saturating_sub(entry.recorded_frame) > 1 {
                    report.stale += 1;
                }
                match self.execute(&mut owner, &entry.command) {
                    Ok(()) => report.replayed += 1,
                    Err(err) => {
                        report.errors += 1;
                        self.stats().inc_replay_errors();
                        if err.is_device_loss() {
                            log::debug!("Replay: {:?} hit device loss", entry.command.op());
                            self.note_loss();
                        } else {
                            log::warn!("Replay: {:?} failed: {}", entry.command.op(), err);
                        }
                    }
                }
            }
            binding.recycle(batch);
        }

        if report.stale > 0 {
            log::warn!(
                "Replay: {} entries were recorded more than one frame ago (frame {})",
                report.stale,
                current_frame
            );
        }

        self.stats().inc_flushes();
        self.stats().add_commands_replayed(report.replayed as u64);
        self.stats().add_commands_discarded(report.discarded as u64);

        let fence = match owner.handle.device.as_deref_mut() {
            Some(device) if ready => {
                let fence = device.insert_fence();
                owner.last_fence = Some(fence.clone());
                Some(fence)
            }
            _ => None,
        };
        drop(owner);

        if stall_if_busy {
            if let Some(fence) = fence {
                fence.wait();
            }
        }

        log::trace!("Replay: {:?}", report);
        Ok(report)
    }
}
