//! Error types for the device registry
//!
//! Every failure surfaces as a result value to the immediate caller; nothing
//! is retried internally and nothing panics. "No device available" from
//! selection is a normal empty result, not an error.

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, DevMgrError>;

/// Error reported by the algorithm-services collaborator when registration
/// of the crypto algorithms fails during device start.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct AlgServiceError(pub String);

impl AlgServiceError {
    /// Create a new service error with the given reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Device registry errors
#[derive(Debug, thiserror::Error)]
pub enum DevMgrError {
    /// The device table already holds the configured maximum
    #[error("device table is full (capacity {max})")]
    CapacityExceeded {
        /// Configured table capacity
        max: usize,
    },

    /// The exact same handle is already in the table
    #[error("device {device} is already registered")]
    AlreadyRegistered {
        /// Device label
        device: String,
    },

    /// The handle is not in the table
    #[error("device {device} is not registered")]
    NotRegistered {
        /// Device label
        device: String,
    },

    /// Removal attempted while clients still hold leases on the device
    #[error("device {device} has {holders} outstanding leases")]
    DeviceBusy {
        /// Device label
        device: String,
        /// Lease count observed at removal time
        holders: u32,
    },

    /// The owning module could not be pinned on first acquisition
    #[error("failed to pin owner of device {device}")]
    PinFailed {
        /// Device label
        device: String,
    },

    /// Algorithm registration failed during start; the device stays stopped
    #[error("algorithm registration failed: {0}")]
    AlgRegistration(#[from] AlgServiceError),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parse error
    #[error("parse error: {0}")]
    Parse(String),
}
