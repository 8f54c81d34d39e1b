//! Per-thread command recording.
//!
//! The [`CommandChannel`] knows which thread owns the device and maps every
//! other thread to its own [`ThreadBinding`]: a bounded command buffer behind
//! a mutex that only that thread and the replay engine ever take. Bindings
//! are created on first use and live as long as the channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};

use crate::command::{CommandBuffer, CommandEntry, DeviceCommand};
use crate::error::DeviceResult;

/// A thread's private command buffer.
#[derive(Debug)]
pub struct ThreadBinding {
    thread_id: ThreadId,
    name: Option<String>,
    buffer: Mutex<CommandBuffer>,
}

impl ThreadBinding {
    fn new(thread_id: ThreadId, name: Option<String>, capacity: usize) -> Self {
        Self {
            thread_id,
            name,
            buffer: Mutex::new(CommandBuffer::new(capacity)),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Name of the thread at registration, if it had one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of commands waiting for replay.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    fn push(&self, command: DeviceCommand, frame: u32) -> DeviceResult<()> {
        self.buffer.lock().push(command, frame)
    }

    /// Swap the recorded entries out. The lock is held only for the swap.
    pub(crate) fn take_batch(&self) -> Vec<CommandEntry> {
        self.buffer.lock().take()
    }

    pub(crate) fn recycle(&self, spent: Vec<CommandEntry>) {
        self.buffer.lock().recycle(spent);
    }
}

#[derive(Debug, Default)]
struct Bindings {
    by_thread: HashMap<ThreadId, Arc<ThreadBinding>>,
    // Registration order, which is also replay order.
    ordered: Vec<Arc<ThreadBinding>>,
}

/// Registry of thread bindings plus the owning thread's identity.
#[derive(Debug)]
pub struct CommandChannel {
    owner: ThreadId,
    fake_main: RwLock<Option<ThreadId>>,
    bindings: RwLock<Bindings>,
    deferred: Arc<ThreadBinding>,
    current_frame: AtomicU32,
    capacity: usize,
}

impl CommandChannel {
    /// Create a channel owned by the calling thread.
    pub fn new(capacity: usize) -> Self {
        let owner = thread::current();
        Self {
            owner: owner.id(),
            fake_main: RwLock::new(None),
            bindings: RwLock::new(Bindings::default()),
            deferred: Arc::new(ThreadBinding::new(
                owner.id(),
                owner.name().map(str::to_owned),
                capacity,
            )),
            current_frame: AtomicU32::new(0),
            capacity,
        }
    }

    pub fn owner_thread(&self) -> ThreadId {
        self.owner
    }

    /// Whether the calling thread may talk to the device directly.
    pub fn is_owner_thread(&self) -> bool {
        let current = thread::current().id();
        current == self.owner || *self.fake_main.read() == Some(current)
    }

    /// Register the calling thread as a secondary producer.
    ///
    /// Registration also happens implicitly on the first recorded command.
    pub fn notify_secondary_thread(&self) {
        if self.is_owner_thread() {
            log::warn!("CommandChannel: owning thread tried to register as secondary");
            return;
        }
        self.binding_for_current();
    }

    /// Treat the calling thread as the owning thread.
    ///
    /// The caller guarantees that this thread and the real owner never call
    /// the proxy at the same time. If they do, the device sees the calls
    /// in an unspecified order.
    pub fn notify_fake_main_thread(&self) {
        let current = thread::current().id();
        let mut fake_main = self.fake_main.write();
        if let Some(previous) = *fake_main {
            if previous != current {
                log::warn!(
                    "CommandChannel: fake main thread moved from {:?} to {:?}",
                    previous,
                    current
                );
            }
        }
        *fake_main = Some(current);
        log::debug!("CommandChannel: {:?} acts as owning thread", current);
    }

    /// Drop the fake main thread registration.
    pub fn clear_fake_main_thread(&self) {
        *self.fake_main.write() = None;
    }

    pub fn notify_current_frame(&self, frame: u32) {
        self.current_frame.store(frame, Ordering::Release);
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame.load(Ordering::Acquire)
    }

    /// Append a command to the calling thread's buffer.
    pub fn record(&self, command: DeviceCommand) -> DeviceResult<()> {
        let binding = self.binding_for_current();
        log::trace!("CommandChannel: {:?} recorded {:?}", binding.thread_id, command.op());
        binding.push(command, self.current_frame())
    }

    /// Append a command to the owning thread's deferred buffer.
    pub fn defer(&self, command: DeviceCommand) -> DeviceResult<()> {
        self.deferred.push(command, self.current_frame())
    }

    /// Bindings in replay order: secondary threads by registration order,
    /// then the owning thread's deferred buffer.
    pub(crate) fn replay_order(&self) -> Vec<Arc<ThreadBinding>> {
        let bindings = self.bindings.read();
        let mut order = Vec::with_capacity(bindings.ordered.len() + 1);
        order.extend(bindings.ordered.iter().cloned());
        order.push(Arc::clone(&self.deferred));
        order
    }

    /// Total number of commands waiting for replay.
    pub fn pending(&self) -> usize {
        let secondary: usize = self
            .bindings
            .read()
            .ordered
            .iter()
            .map(|binding| binding.pending())
            .sum();
        secondary + self.deferred.pending()
    }

    /// Number of registered secondary threads.
    pub fn secondary_count(&self) -> usize {
        self.bindings.read().ordered.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn binding_for_current(&self) -> Arc<ThreadBinding> {
        let current = thread::current();
        if let Some(binding) = self.bindings.read().by_thread.get(&current.id()) {
            return Arc::clone(binding);
        }

        let mut bindings = self.bindings.write();
        if let Some(binding) = bindings.by_thread.get(&current.id()) {
            return Arc::clone(binding);
        }
        let binding = Arc::new(ThreadBinding::new(
            current.id(),
            current.name().map(str::to_owned),
            self.capacity,
        ));
        bindings.by_thread.insert(current.id(), Arc::clone(&binding));
        bindings.ordered.push(Arc::clone(&binding));
        log::debug!(
            "CommandChannel: registered secondary thread {:?} ({})",
            current.id(),
            current.name().unwrap_or("unnamed")
        );
        binding
    }
}

static_assertions::assert_impl_all!(CommandChannel: Send, Sync);
static_assertions::assert_impl_all!(ThreadBinding: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;

    fn draw(start_vertex: u32) -> DeviceCommand {
        DeviceCommand::DrawPrimitive {
            primitive: crate::types::PrimitiveType::TriangleList,
            start_vertex,
            primitive_count: 1,
        }
    }

    #[test]
    fn test_owner_identity() {
        let channel = CommandChannel::new(16);
        assert!(channel.is_owner_thread());
        thread::scope(|scope| {
            scope.spawn(|| assert!(!channel.is_owner_thread()));
        });
    }

    #[test]
    fn test_secondary_registration_is_idempotent() {
        let channel = CommandChannel::new(16);
        thread::scope(|scope| {
            scope.spawn(|| {
                channel.notify_secondary_thread();
                channel.notify_secondary_thread();
                channel.record(draw(0)).unwrap();
            });
        });
        assert_eq!(channel.secondary_count(), 1);
        assert_eq!(channel.pending(), 1);
    }

    #[test]
    fn test_owner_cannot_register_as_secondary() {
        let channel = CommandChannel::new(16);
        channel.notify_secondary_thread();
        assert_eq!(channel.secondary_count(), 0);
    }

    #[test]
    fn test_fake_main_thread() {
        let channel = CommandChannel::new(16);
        thread::scope(|scope| {
            scope.spawn(|| {
                channel.notify_fake_main_thread();
                assert!(channel.is_owner_thread());
            });
        });
        channel.clear_fake_main_thread();
        thread::scope(|scope| {
            scope.spawn(|| assert!(!channel.is_owner_thread()));
        });
    }

    #[test]
    fn test_record_stamps_frame_and_bounds() {
        let channel = CommandChannel::new(2);
        channel.notify_current_frame(9);
        thread::scope(|scope| {
            scope.spawn(|| {
                channel.record(draw(0)).unwrap();
                channel.record(draw(1)).unwrap();
                assert_eq!(
                    channel.record(draw(2)),
                    Err(DeviceError::CommandBufferFull { capacity: 2 })
                );
            });
        });

        let order = channel.replay_order();
        assert_eq!(order.len(), 2);
        let batch = order[0].take_batch();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|entry| entry.recorded_frame == 9));
    }

    #[test]
    fn test_deferred_replays_last() {
        let channel = CommandChannel::new(16);
        channel.defer(draw(0)).unwrap();
        thread::scope(|scope| {
            scope.spawn(|| channel.record(draw(1)).unwrap());
        });
        let order = channel.replay_order();
        assert_eq!(order.last().map(|b| b.thread_id()), Some(channel.owner_thread()));
        assert_eq!(order[0].pending(), 1);
    }
}
