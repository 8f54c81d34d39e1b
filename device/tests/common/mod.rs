//! Common utilities for device integration tests.
//!
//! Every test builds its device on the dummy backend through [`TestRig`],
//! which keeps a [`DummyProbe`] for scripting loss and observing device calls.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use vellum_device::{
    DeviceConfig, DeviceCreateRequest, DeviceManager, DeviceResource, DummyDriver, DummyProbe,
    Extent2d, HeadlessControl, HeadlessHost, Preloadable, ResourceHandle, ResourceKind, WindowId,
};

pub const WINDOW: WindowId = WindowId(7);

/// Initialize logging once for the test binary.
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// Configuration with every delay removed.
pub fn fast_config() -> DeviceConfig {
    DeviceConfig::default()
        .with_create_retry_delay(Duration::ZERO)
        .with_lost_poll_interval(Duration::from_millis(1))
        .with_reset_poll_interval(Duration::ZERO)
        .with_preload_budget(Duration::from_secs(1))
}

/// A device manager on the dummy backend plus handles to observe it.
pub struct TestRig {
    pub manager: DeviceManager,
    pub probe: DummyProbe,
    pub host: HeadlessControl,
}

impl TestRig {
    /// Manager with a windowed device already created.
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: DeviceConfig) -> Self {
        let mut rig = Self::uninitialized(config);
        rig.manager
            .request_device_create(DeviceCreateRequest::new(WINDOW))
            .expect("device creation on the dummy backend");
        rig
    }

    /// Manager without a device.
    pub fn uninitialized(config: DeviceConfig) -> Self {
        init_logging();
        let driver = DummyDriver::new();
        let probe = driver.probe().clone();
        let host = HeadlessHost::new(WINDOW, Extent2d::new(1024, 768));
        let control = host.control();
        Self {
            manager: DeviceManager::new(Box::new(driver), Box::new(host), config),
            probe,
            host: control,
        }
    }
}

/// Resource that counts its lifecycle callbacks.
#[derive(Debug)]
pub struct CountingResource {
    kind: ResourceKind,
    pub release_unmanaged: AtomicU32,
    pub create_unmanaged: AtomicU32,
    pub release_managed: AtomicU32,
    pub create_managed: AtomicU32,
    pub made_resident: AtomicU32,
}

impl CountingResource {
    pub fn new(kind: ResourceKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            release_unmanaged: AtomicU32::new(0),
            create_unmanaged: AtomicU32::new(0),
            release_managed: AtomicU32::new(0),
            create_managed: AtomicU32::new(0),
            made_resident: AtomicU32::new(0),
        })
    }

    /// `(release_unmanaged, create_unmanaged, release_managed, create_managed)`
    pub fn counts(&self) -> (u32, u32, u32, u32) {
        (
            self.release_unmanaged.load(Ordering::Relaxed),
            self.create_unmanaged.load(Ordering::Relaxed),
            self.release_managed.load(Ordering::Relaxed),
            self.create_managed.load(Ordering::Relaxed),
        )
    }
}

impl DeviceResource for CountingResource {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn release_unmanaged(&self) {
        self.release_unmanaged.fetch_add(1, Ordering::Relaxed);
    }

    fn create_unmanaged(&self) {
        self.create_unmanaged.fetch_add(1, Ordering::Relaxed);
    }

    fn release_managed(&self) {
        self.release_managed.fetch_add(1, Ordering::Relaxed);
    }

    fn create_managed(&self) {
        self.create_managed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Preloadable for CountingResource {
    fn make_resident(&self) {
        self.made_resident.fetch_add(1, Ordering::Relaxed);
    }
}

/// Register `count` resources of one kind.
pub fn register_many(
    manager: &mut DeviceManager,
    kind: ResourceKind,
    count: usize,
) -> Vec<(Arc<CountingResource>, ResourceHandle)> {
    (0..count)
        .map(|_| {
            let resource = CountingResource::new(kind);
            let handle = manager.register_resource(&resource);
            (resource, handle)
        })
        .collect()
}
