//! Core type definitions for Larder.
//!
//! This crate defines the fundamental types shared by the offline sync
//! engine:
//! - Record and owner identifiers (client-generated temp ids vs
//!   server-issued ids as a tagged union)
//! - The entity record model and its sync-status state machine
//! - The mutation-queue entry model
//!
//! Application-specific payload fields (name, quantity, unit, …) are
//! carried as opaque JSON; nothing here knows what a pantry item contains.

mod ids;
mod queue;
mod record;

pub use ids::{LocalId, OwnerId, RecordId, RemoteId, TEMP_ID_PREFIX};
pub use queue::{Operation, OperationKind, QueueEntry, QueueStatus};
pub use record::{Collection, Payload, Record, SyncStatus};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown sync status: {0}")]
    UnknownStatus(String),

    #[error("unknown queue status: {0}")]
    UnknownQueueStatus(String),

    #[error("unknown operation kind: {0}")]
    UnknownOperation(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),
}
