//! The mutation-queue entry model.
//!
//! A queue entry is a durable record of one write operation awaiting
//! application to the remote backend. Entries are totally ordered by
//! their auto-assigned row id; the enqueue timestamp is kept for
//! observability only.

use crate::{Collection, Error, LocalId, OwnerId, Payload, RemoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of write a queue entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    /// The string form used at the SQLite boundary.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::UnknownOperation(other.to_string())),
        }
    }
}

/// Processing state of a queue entry.
///
/// `Pending → InProgress → {removed on success | Failed}`. A `Failed`
/// entry with retry budget left may be reset to `Pending`; one past the
/// cap stays `Failed` until manually cleared, so no loss is silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl QueueStatus {
    /// The string form used at the SQLite boundary.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::UnknownQueueStatus(other.to_string())),
        }
    }
}

/// A write operation to enqueue. This is the caller-facing shape; the
/// durable [`QueueEntry`] adds the id and retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub collection: Collection,
    /// Target document; absent for creates (the server assigns the id).
    pub doc_id: Option<RemoteId>,
    /// For creates: the optimistic local record this operation will
    /// confirm, so the processor can retire it on success.
    pub local_id: Option<LocalId>,
    /// Data to write; absent for deletes.
    pub payload: Option<Payload>,
    pub owner: OwnerId,
}

impl Operation {
    /// A create of a new document, linked to its optimistic local record.
    #[must_use]
    pub fn create(
        collection: Collection,
        owner: OwnerId,
        payload: Payload,
        local_id: LocalId,
    ) -> Self {
        Self {
            kind: OperationKind::Create,
            collection,
            doc_id: None,
            local_id: Some(local_id),
            payload: Some(payload),
            owner,
        }
    }

    /// An in-place update of an existing document.
    #[must_use]
    pub fn update(
        collection: Collection,
        owner: OwnerId,
        doc_id: RemoteId,
        payload: Payload,
    ) -> Self {
        Self {
            kind: OperationKind::Update,
            collection,
            doc_id: Some(doc_id),
            local_id: None,
            payload: Some(payload),
            owner,
        }
    }

    /// A delete of an existing document.
    #[must_use]
    pub fn delete(collection: Collection, owner: OwnerId, doc_id: RemoteId) -> Self {
        Self {
            kind: OperationKind::Delete,
            collection,
            doc_id: Some(doc_id),
            local_id: None,
            payload: None,
            owner,
        }
    }
}

/// A durable mutation-queue row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Auto-assigned, monotonically increasing. Authoritative FIFO order.
    pub id: i64,
    pub kind: OperationKind,
    /// Logical collection name as persisted. Resolved by the processor at
    /// drain time; an unresolvable name fails the entry.
    pub collection: String,
    pub doc_id: Option<RemoteId>,
    pub local_id: Option<LocalId>,
    pub payload: Option<Payload>,
    pub owner: OwnerId,
    /// Enqueue time. Secondary sort key and observability only — queue
    /// order is authoritative.
    pub queued_at: DateTime<Utc>,
    pub status: QueueStatus,
    pub retry_count: u32,
    /// Diagnostic from the most recent failed attempt; cleared on success.
    pub last_error: Option<String>,
}

impl QueueEntry {
    /// True when the entry is awaiting a drain pass.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.status, QueueStatus::Pending | QueueStatus::Failed)
    }
}
