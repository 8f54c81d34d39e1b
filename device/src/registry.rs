//! Resource lifecycle registry.
//!
//! Objects that hold device-dependent state implement [`DeviceResource`] and
//! register with the [`ResourceRegistry`]. The lifecycle manager drives them
//! through release/create passes around resets and device recreation:
//!
//! - the *unmanaged* tier (render targets, dynamic buffers) is released
//!   before every reset and recreated after it
//! - the *managed* tier is only released and recreated together with the
//!   whole device
//!
//! Registration slots live in a dense array addressed through a sparse table
//! of generational [`ResourceHandle`]s, so deregistration is an O(1)
//! swap-remove and stale handles are detected. The registry holds weak
//! references; a dropped resource is pruned on the next pass.

use std::sync::{Arc, Weak};

/// Kind of device resource, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Buffer,
    Shader,
    Surface,
}

/// Device-dependent state that must follow the device through loss and
/// recreation.
///
/// Every callback must be idempotent: releasing something already released,
/// or creating something already created, does nothing.
pub trait DeviceResource: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Drop state that does not survive a reset.
    fn release_unmanaged(&self) {}

    /// Recreate state dropped by [`DeviceResource::release_unmanaged`].
    fn create_unmanaged(&self) {}

    /// Drop state that survives resets but not device recreation.
    fn release_managed(&self) {}

    /// Recreate state dropped by [`DeviceResource::release_managed`].
    fn create_managed(&self) {}
}

/// One of the four registry passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePass {
    ReleaseUnmanaged,
    CreateUnmanaged,
    ReleaseManaged,
    CreateManaged,
}

impl LifecyclePass {
    fn run(self, resource: &dyn DeviceResource) {
        match self {
            Self::ReleaseUnmanaged => resource.release_unmanaged(),
            Self::CreateUnmanaged => resource.create_unmanaged(),
            Self::ReleaseManaged => resource.release_managed(),
            Self::CreateManaged => resource.create_managed(),
        }
    }
}

/// Stable handle to a registration slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    generation: u32,
}

impl ResourceHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    /// Position in the dense array; `None` when the slot is free.
    dense: Option<u32>,
}

struct Member {
    slot: u32,
    kind: ResourceKind,
    resource: Weak<dyn DeviceResource>,
}

/// Arena of registered device resources.
#[derive(Default)]
pub struct ResourceRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    members: Vec<Member>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. The registry keeps only a weak reference.
    pub fn register<R: DeviceResource + 'static>(&mut self, resource: &Arc<R>) -> ResourceHandle {
        let weak: Weak<dyn DeviceResource> = Arc::downgrade(resource) as Weak<dyn DeviceResource>;
        let kind = resource.kind();
        let dense = self.members.len() as u32;

        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.dense = Some(dense);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    dense: Some(dense),
                });
                (self.slots.len() - 1) as u32
            }
        };

        self.members.push(Member {
            slot: index,
            kind,
            resource: weak,
        });
        log::trace!("ResourceRegistry: registered {:?} in slot {}", kind, index);

        ResourceHandle {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Remove a registration. Returns `false` for stale or unknown handles.
    pub fn deregister(&mut self, handle: ResourceHandle) -> bool {
        let Some(slot) = self.slots.get(handle.index as usize) else {
            return false;
        };
        if slot.generation != handle.generation {
            return false;
        }
        let Some(dense) = slot.dense else {
            return false;
        };
        self.remove_dense(dense as usize);
        true
    }

    /// Whether `handle` still refers to a live registration.
    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.generation == handle.generation && slot.dense.is_some())
    }

    /// Number of registrations, including ones whose resource has died but
    /// has not been pruned yet.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of registrations of the given kind.
    pub fn count_kind(&self, kind: ResourceKind) -> usize {
        self.members.iter().filter(|member| member.kind == kind).count()
    }

    /// Remove registrations whose resource has been dropped.
    pub fn cleanup_dead_resources(&mut self) -> usize {
        let mut removed = 0;
        let mut index = 0;
        while index < self.members.len() {
            if self.members[index].resource.strong_count() == 0 {
                self.remove_dense(index);
                removed += 1;
            } else {
                index += 1;
            }
        }
        if removed > 0 {
            log::debug!("ResourceRegistry: pruned {} dead resources", removed);
        }
        removed
    }

    /// Invoke one callback on every live resource. Returns how many ran.
    ///
    /// The live set is snapshotted before any callback runs.
    pub fn run_pass(&mut self, pass: LifecyclePass) -> usize {
        self.cleanup_dead_resources();
        let live: Vec<Arc<dyn DeviceResource>> = self
            .members
            .iter()
            .filter_map(|member| member.resource.upgrade())
            .collect();

        log::debug!("ResourceRegistry: {:?} on {} resources", pass, live.len());
        for resource in &live {
            pass.run(resource.as_ref());
        }
        live.len()
    }

    pub fn release_unmanaged(&mut self) -> usize {
        self.run_pass(LifecyclePass::ReleaseUnmanaged)
    }

    pub fn create_unmanaged(&mut self) -> usize {
        self.run_pass(LifecyclePass::CreateUnmanaged)
    }

    pub fn release_managed(&mut self) -> usize {
        self.run_pass(LifecyclePass::ReleaseManaged)
    }

    pub fn create_managed(&mut self) -> usize {
        self.run_pass(LifecyclePass::CreateManaged)
    }

    fn remove_dense(&mut self, dense: usize) {
        let removed = self.members.swap_remove(dense);
        let slot = &mut self.slots[removed.slot as usize];
        slot.dense = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(removed.slot);

        if let Some(moved) = self.members.get(dense) {
            self.slots[moved.slot as usize].dense = Some(dense as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counting {
        released: AtomicU32,
        created: AtomicU32,
        managed_released: AtomicU32,
    }

    impl DeviceResource for Counting {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Texture
        }

        fn release_unmanaged(&self) {
            self.released.fetch_add(1, Ordering::Relaxed);
        }

        fn create_unmanaged(&self) {
            self.created.fetch_add(1, Ordering::Relaxed);
        }

        fn release_managed(&self) {
            self.managed_released.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct Shader;

    impl DeviceResource for Shader {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Shader
        }
    }

    #[test]
    fn test_register_and_pass() {
        let mut registry = ResourceRegistry::new();
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        registry.register(&a);
        registry.register(&b);

        assert_eq!(registry.release_unmanaged(), 2);
        assert_eq!(registry.create_unmanaged(), 2);
        assert_eq!(a.released.load(Ordering::Relaxed), 1);
        assert_eq!(b.created.load(Ordering::Relaxed), 1);
        assert_eq!(a.managed_released.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_deregister_swap_remove() {
        let mut registry = ResourceRegistry::new();
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let c = Arc::new(Counting::default());
        let ha = registry.register(&a);
        let hb = registry.register(&b);
        let hc = registry.register(&c);

        assert!(registry.deregister(ha));
        assert!(!registry.contains(ha));
        assert!(registry.contains(hb));
        assert!(registry.contains(hc));
        assert_eq!(registry.len(), 2);

        // The moved member is still reachable through its handle.
        assert!(registry.deregister(hc));
        assert!(registry.contains(hb));
        assert_eq!(registry.len(), 1);

        registry.release_unmanaged();
        assert_eq!(a.released.load(Ordering::Relaxed), 0);
        assert_eq!(b.released.load(Ordering::Relaxed), 1);
        assert_eq!(c.released.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut registry = ResourceRegistry::new();
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let ha = registry.register(&a);
        assert!(registry.deregister(ha));
        assert!(!registry.deregister(ha));

        // Slot reuse bumps the generation.
        let hb = registry.register(&b);
        assert_eq!(hb.index(), ha.index());
        assert_ne!(hb.generation(), ha.generation());
        assert!(!registry.deregister(ha));
        assert!(registry.contains(hb));
    }

    #[test]
    fn test_dropped_resources_pruned() {
        let mut registry = ResourceRegistry::new();
        let a = Arc::new(Counting::default());
        let handle = {
            let temp = Arc::new(Shader);
            registry.register(&temp)
        };
        registry.register(&a);
        assert_eq!(registry.count_kind(ResourceKind::Shader), 1);

        assert_eq!(registry.release_unmanaged(), 1);
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(handle));
        assert_eq!(registry.count_kind(ResourceKind::Shader), 0);
    }
}
