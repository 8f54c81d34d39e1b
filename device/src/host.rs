//! Boundary to the windowing layer.
//!
//! The device subsystem needs very little from the host window: its
//! identity, its client size, the ability to switch it between windowed and
//! fullscreen presentation, and a way to pump its message loop while the
//! device is lost.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::types::{Extent2d, WindowId};

/// Outcome of pumping the host message loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Continue,
    /// The application is shutting down.
    Quit,
}

/// The window a device presents into.
pub trait HostWindow: Send {
    fn id(&self) -> WindowId;

    /// Process pending window messages.
    fn pump_messages(&mut self) -> HostSignal;

    /// Current client area size.
    fn client_size(&self) -> Extent2d;

    fn is_minimized(&self) -> bool;

    /// Client size the window will have once restored.
    fn restored_size(&self) -> Extent2d;

    /// Prepare the window for exclusive fullscreen presentation.
    fn enter_fullscreen(&mut self);

    /// Restore the windowed style and placement.
    fn leave_fullscreen(&mut self);
}

/// Window stand-in for tests and headless runs.
///
/// The quit flag and size can be changed from other threads through
/// [`HeadlessControl`].
#[derive(Debug)]
pub struct HeadlessHost {
    id: WindowId,
    control: HeadlessControl,
}

/// Shared handle to a [`HeadlessHost`]'s state.
#[derive(Debug, Clone)]
pub struct HeadlessControl {
    quit: Arc<AtomicBool>,
    minimized: Arc<AtomicBool>,
    fullscreen: Arc<AtomicBool>,
    width: Arc<AtomicU32>,
    height: Arc<AtomicU32>,
    restored_width: Arc<AtomicU32>,
    restored_height: Arc<AtomicU32>,
    pumps: Arc<AtomicU32>,
}

impl HeadlessControl {
    /// Ask the host to quit on its next pump.
    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Release);
    }

    pub fn resize(&self, size: Extent2d) {
        self.width.store(size.width, Ordering::Release);
        self.height.store(size.height, Ordering::Release);
        self.restored_width.store(size.width, Ordering::Release);
        self.restored_height.store(size.height, Ordering::Release);
    }

    /// Minimize the window. Its client area collapses to zero.
    pub fn set_minimized(&self, minimized: bool) {
        self.minimized.store(minimized, Ordering::Release);
    }

    /// Whether the window is currently set up for fullscreen.
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::Acquire)
    }

    /// Number of message pumps so far.
    pub fn pump_count(&self) -> u32 {
        self.pumps.load(Ordering::Acquire)
    }
}

impl HeadlessHost {
    pub fn new(id: WindowId, size: Extent2d) -> Self {
        Self {
            id,
            control: HeadlessControl {
                quit: Arc::new(AtomicBool::new(false)),
                minimized: Arc::new(AtomicBool::new(false)),
                fullscreen: Arc::new(AtomicBool::new(false)),
                width: Arc::new(AtomicU32::new(size.width)),
                height: Arc::new(AtomicU32::new(size.height)),
                restored_width: Arc::new(AtomicU32::new(size.width)),
                restored_height: Arc::new(AtomicU32::new(size.height)),
                pumps: Arc::new(AtomicU32::new(0)),
            },
        }
    }

    pub fn control(&self) -> HeadlessControl {
        self.control.clone()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.control.is_fullscreen()
    }
}

impl HostWindow for HeadlessHost {
    fn id(&self) -> WindowId {
        self.id
    }

    fn pump_messages(&mut self) -> HostSignal {
        self.control.pumps.fetch_add(1, Ordering::AcqRel);
        if self.control.quit.load(Ordering::Acquire) {
            HostSignal::Quit
        } else {
            HostSignal::Continue
        }
    }

    fn client_size(&self) -> Extent2d {
        if self.is_minimized() {
            return Extent2d::default();
        }
        Extent2d::new(
            self.control.width.load(Ordering::Acquire),
            self.control.height.load(Ordering::Acquire),
        )
    }

    fn is_minimized(&self) -> bool {
        self.control.minimized.load(Ordering::Acquire)
    }

    fn restored_size(&self) -> Extent2d {
        Extent2d::new(
            self.control.restored_width.load(Ordering::Acquire),
            self.control.restored_height.load(Ordering::Acquire),
        )
    }

    fn enter_fullscreen(&mut self) {
        log::debug!("HeadlessHost: entering fullscreen");
        self.control.fullscreen.store(true, Ordering::Release);
    }

    fn leave_fullscreen(&mut self) {
        log::debug!("HeadlessHost: leaving fullscreen");
        self.control.fullscreen.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_signal() {
        let mut host = HeadlessHost::new(WindowId(3), Extent2d::new(800, 600));
        let control = host.control();
        assert_eq!(host.pump_messages(), HostSignal::Continue);
        control.request_quit();
        assert_eq!(host.pump_messages(), HostSignal::Quit);
        assert_eq!(control.pump_count(), 2);
    }

    #[test]
    fn test_minimized_size() {
        let host = HeadlessHost::new(WindowId(3), Extent2d::new(800, 600));
        host.control().set_minimized(true);
        assert!(host.client_size().is_empty());
        assert_eq!(host.restored_size(), Extent2d::new(800, 600));
    }
}
