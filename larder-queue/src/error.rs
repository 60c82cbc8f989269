//! Error types for the mutation queue.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur in queue operations.
///
/// Per-entry failures during a drain are recorded on the entry itself
/// (`retry_count`, `last_error`), not propagated; only store failures
/// abort a drain.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Local storage failed.
    #[error("storage error: {0}")]
    Store(#[from] larder_store::StoreError),

    /// The remote backend rejected or never received the operation.
    #[error("remote error: {0}")]
    Remote(#[from] larder_remote::RemoteError),

    /// An update/delete entry has no target document id. Programming
    /// error; fails the single entry without touching the rest.
    #[error("operation missing target document id")]
    MissingTarget,

    /// A queue entry references a collection no adapter recognizes.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
}
