//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Remote failures never appear here from `add`/`update`/`delete` — those
/// degrade to queueing instead of erroring. What does surface: local
/// storage trouble (terminal per session) and lookups of records that do
/// not exist.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local storage failed.
    #[error("storage error: {0}")]
    Store(#[from] larder_store::StoreError),

    /// The mutation queue failed (storage underneath, in practice).
    #[error("queue error: {0}")]
    Queue(#[from] larder_queue::QueueError),

    /// The remote backend failed where no queue fallback applies.
    #[error("remote error: {0}")]
    Remote(#[from] larder_remote::RemoteError),

    /// The addressed record is not in the local store.
    #[error("no such record: {0}")]
    RecordNotFound(String),
}
