//! Error types for the local store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying persistence layer could not be opened. Terminal for
    /// the session; callers must not retry per-call.
    #[error("local storage unavailable: {0}")]
    Unavailable(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be mapped back to a typed value.
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}
