//! The entity record model and its sync-status state machine.

use crate::{Error, OwnerId, RecordId, RemoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Application-defined record fields, carried opaquely.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Logical collections held in the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Pantry inventory — the synchronized collection.
    Pantry,
    /// Saved recipes — offline cache only, never queued.
    Recipes,
    /// Generated meal plans — offline cache only, never queued.
    MealPlans,
}

impl Collection {
    /// The logical name used in storage and queue entries.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pantry => "pantry",
            Self::Recipes => "recipes",
            Self::MealPlans => "meal_plans",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pantry" => Ok(Self::Pantry),
            "recipes" => Ok(Self::Recipes),
            "meal_plans" => Ok(Self::MealPlans),
            other => Err(Error::UnknownCollection(other.to_string())),
        }
    }
}

/// Where a locally held record stands relative to the remote backend.
///
/// Transitions are driven by the entity service (optimistic writes) and
/// resolved by the queue processor (remote confirmation):
///
/// - `PendingCreate` records exist only locally and carry a local id.
/// - `PendingUpdate` and `PendingDelete` records mirror a remote document
///   (remote id) whose new state has not yet been confirmed.
/// - `Synced` records mirror a confirmed remote document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
}

impl SyncStatus {
    /// The string form used at the SQLite boundary.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::PendingCreate => "pending_create",
            Self::PendingUpdate => "pending_update",
            Self::PendingDelete => "pending_delete",
        }
    }

    /// True for any state awaiting remote confirmation.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !matches!(self, Self::Synced)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(Self::Synced),
            "pending_create" => Ok(Self::PendingCreate),
            "pending_update" => Ok(Self::PendingUpdate),
            "pending_delete" => Ok(Self::PendingDelete),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// An entity record as held in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identity — local until the create round-trips.
    pub id: RecordId,
    /// Owning user; all lookups are scoped by this.
    pub owner: OwnerId,
    /// Application fields (name, quantity, unit, category, …).
    pub payload: Payload,
    /// Sync state relative to the remote backend.
    pub status: SyncStatus,
    /// When the record was first stored locally.
    pub added_at: DateTime<Utc>,
}

impl Record {
    /// Creates a record mirroring a confirmed remote document.
    #[must_use]
    pub fn synced(id: RemoteId, owner: OwnerId, payload: Payload) -> Self {
        Self {
            id: RecordId::Remote(id),
            owner,
            payload,
            status: SyncStatus::Synced,
            added_at: Utc::now(),
        }
    }

    /// Creates an optimistic local record awaiting a remote create.
    /// Assigns a fresh local id; the invariant that pending creates carry
    /// local ids holds by construction.
    #[must_use]
    pub fn pending_create(owner: OwnerId, payload: Payload) -> Self {
        Self {
            id: RecordId::Local(crate::LocalId::new()),
            owner,
            payload,
            status: SyncStatus::PendingCreate,
            added_at: Utc::now(),
        }
    }

    /// Returns a copy with a different sync status.
    #[must_use]
    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.status = status;
        self
    }

    /// True when the record awaits remote confirmation.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }
}
