//! Error types for the store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors produced by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while loading or flushing the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file or a value could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A `get` without a default was asked for a key that was never set.
    #[error("key not found: {namespace}:{key}")]
    KeyNotFound {
        /// Namespace the lookup was scoped to.
        namespace: String,
        /// The missing key.
        key: String,
    },

    /// A release was attempted for a namespace with no granted lock.
    /// This is a programming error, not a recoverable condition.
    #[error("no lock held for namespace '{namespace}'")]
    NoActiveLock {
        /// Namespace whose queue was empty.
        namespace: String,
    },
}
