//! Error types for the remote backend interface.

use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur talking to the remote backend.
///
/// Cloneable so subscription streams can carry errors in-band.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The remote write or read did not go through. Covers both network
    /// partition and remote-side rejection — the engine treats every
    /// remote failure the same way (queue and retry).
    #[error("remote unreachable: {0}")]
    Unreachable(String),
}
