//! Device error types.

use thiserror::Error;

/// Errors that can occur in the device subsystem.
///
/// Transient loss (`DeviceLost`, `DeviceNotReset`) is handled by the
/// [`DeviceManager`](crate::DeviceManager) and never reaches drawing code.
/// Creation and enumeration failures, driver faults and out-of-memory are
/// fatal; see [`DeviceError::is_fatal`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No adapter capable of hardware rasterisation was found.
    #[error("no usable graphics adapter found")]
    NoAdapter,
    /// The driver could not enumerate adapters at all.
    #[error("adapter enumeration failed: {0}")]
    EnumerationFailed(String),
    /// The requested adapter does not exist.
    #[error("adapter index {index} out of range ({count})")]
    InvalidAdapter { index: usize, count: usize },
    /// The requested display mode does not exist on the adapter.
    #[error("display mode index {index} out of range ({count})")]
    InvalidMode { index: usize, count: usize },
    /// Device creation kept failing after every attempt.
    #[error("device creation failed after {attempts} attempts: {reason}")]
    CreationFailed { attempts: u32, reason: String },
    /// The device is lost and cannot be reset yet.
    #[error("GPU device lost")]
    DeviceLost,
    /// The device is lost and can be reset now.
    #[error("GPU device lost, reset required")]
    DeviceNotReset,
    /// The driver reported an internal fault.
    #[error("internal driver error")]
    DriverInternalError,
    /// The device ran out of video memory.
    #[error("out of video memory")]
    OutOfVideoMemory,
    /// Reset failed with something other than "still lost".
    #[error("device reset failed: {0}")]
    ResetFailed(String),
    /// The call was made in a state where it is not allowed.
    #[error("invalid call: {0}")]
    InvalidCall(String),
    /// The operation may only run on the owning thread.
    #[error("operation must run on the owning thread")]
    NotOwningThread,
    /// A secondary thread's command buffer reached its capacity.
    #[error("command buffer full ({capacity} entries)")]
    CommandBufferFull { capacity: usize },
    /// No device has been created yet.
    #[error("no device has been created")]
    NoDevice,
    /// The device has been released for good.
    #[error("device has been released")]
    Released,
}

impl DeviceError {
    /// Whether this error means the device must be abandoned.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoAdapter
                | Self::EnumerationFailed(_)
                | Self::CreationFailed { .. }
                | Self::DriverInternalError
                | Self::OutOfVideoMemory
        )
    }

    /// Whether this error signals a (possibly recoverable) device loss.
    pub fn is_device_loss(&self) -> bool {
        matches!(self, Self::DeviceLost | Self::DeviceNotReset)
    }
}

/// Result alias used throughout the crate.
pub type DeviceResult<T> = Result<T, DeviceError>;
