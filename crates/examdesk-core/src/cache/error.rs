use thiserror::Error;

/// Failures of the persistent medium.
///
/// Callers inside the crate never propagate these past the store: reads
/// degrade to a miss and writes to a no-op.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}
