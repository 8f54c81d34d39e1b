//! Device subsystem configuration.

use std::time::Duration;

/// Tunables for device creation, loss recovery, command buffering and
/// resource preloading.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use vellum_device::DeviceConfig;
///
/// let config = DeviceConfig::default()
///     .with_create_attempts(3)
///     .with_lost_poll_interval(Duration::from_millis(10))
///     .with_vsync(false);
/// assert_eq!(config.create_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// How many times device creation is attempted before giving up.
    pub create_attempts: u32,
    /// Fixed delay between creation attempts.
    pub create_retry_delay: Duration,
    /// Poll interval while the device is lost and not resettable.
    pub lost_poll_interval: Duration,
    /// Sleep between reset attempts while the device is still lost.
    pub reset_poll_interval: Duration,
    /// Maximum number of entries in each thread's command buffer.
    pub command_buffer_capacity: usize,
    /// Maximum number of queued preload entries.
    pub preload_capacity: usize,
    /// Time the preload queue may spend per frame.
    pub preload_budget: Duration,
    /// Preload budget used when `editor_mode` is set.
    pub editor_preload_budget: Duration,
    /// Use the editor preload budget.
    pub editor_mode: bool,
    /// Wait for vertical sync on present.
    pub vsync: bool,
    /// Request two back buffers instead of one.
    pub triple_buffering: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            create_attempts: 5,
            create_retry_delay: Duration::from_millis(2000),
            lost_poll_interval: Duration::from_millis(50),
            reset_poll_interval: Duration::from_millis(100),
            command_buffer_capacity: 65536,
            preload_capacity: 2000,
            preload_budget: Duration::from_millis(2),
            editor_preload_budget: Duration::from_millis(10),
            editor_mode: false,
            vsync: true,
            triple_buffering: true,
        }
    }
}

impl DeviceConfig {
    /// Set the number of device creation attempts (at least one).
    pub fn with_create_attempts(mut self, attempts: u32) -> Self {
        self.create_attempts = attempts.max(1);
        self
    }

    /// Set the delay between device creation attempts.
    pub fn with_create_retry_delay(mut self, delay: Duration) -> Self {
        self.create_retry_delay = delay;
        self
    }

    /// Set the poll interval used while the device is lost.
    pub fn with_lost_poll_interval(mut self, interval: Duration) -> Self {
        self.lost_poll_interval = interval;
        self
    }

    /// Set the sleep between reset attempts.
    pub fn with_reset_poll_interval(mut self, interval: Duration) -> Self {
        self.reset_poll_interval = interval;
        self
    }

    /// Set the per-thread command buffer capacity (at least one entry).
    pub fn with_command_buffer_capacity(mut self, capacity: usize) -> Self {
        self.command_buffer_capacity = capacity.max(1);
        self
    }

    /// Set the preload queue capacity.
    pub fn with_preload_capacity(mut self, capacity: usize) -> Self {
        self.preload_capacity = capacity;
        self
    }

    /// Set the per-frame preload budget.
    pub fn with_preload_budget(mut self, budget: Duration) -> Self {
        self.preload_budget = budget;
        self
    }

    /// Switch between the game and editor preload budgets.
    pub fn with_editor_mode(mut self, editor_mode: bool) -> Self {
        self.editor_mode = editor_mode;
        self
    }

    /// Enable or disable vertical sync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable triple buffering.
    pub fn with_triple_buffering(mut self, triple_buffering: bool) -> Self {
        self.triple_buffering = triple_buffering;
        self
    }

    /// The preload budget that applies to the current mode.
    pub fn effective_preload_budget(&self) -> Duration {
        if self.editor_mode {
            self.editor_preload_budget
        } else {
            self.preload_budget
        }
    }

    /// Number of back buffers to request.
    pub fn back_buffer_count(&self) -> u32 {
        if self.triple_buffering { 2 } else { 1 }
    }
}
