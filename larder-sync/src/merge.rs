//! The merge algorithm.
//!
//! Combines an authoritative remote snapshot with locally pending
//! mutations into the one view the application reads. Pending local state
//! is an override layer, which makes the result correct under arbitrary
//! interleaving of snapshots and local writes:
//!
//! - pending creates (local ids, guaranteed absent from the snapshot) are
//!   appended
//! - ids pending delete are filtered out, so a delete that has not
//!   round-tripped does not reappear when a stale snapshot arrives
//! - records pending update replace their remote counterpart — the local
//!   copy is the source of truth until the queue confirms it
//!
//! Everything here is pure; the pantry service owns the I/O around it.

use chrono::{DateTime, Utc};
use larder_remote::RemoteRecord;
use larder_types::{OwnerId, Record, RecordId, SyncStatus};
use std::collections::{HashMap, HashSet};

/// Converts a remote document into a `Synced` local record.
///
/// `added_at` is taken from the document's own `addedAt` field when it
/// parses, so re-merging does not churn timestamps.
pub fn record_from_remote(owner: &OwnerId, remote: &RemoteRecord) -> Record {
    let added_at = remote
        .payload
        .get("addedAt")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Record {
        id: RecordId::Remote(remote.id.clone()),
        owner: owner.clone(),
        payload: remote.payload.clone(),
        status: SyncStatus::Synced,
        added_at,
    }
}

/// Merges a remote snapshot with the locally cached records of the same
/// owner.
///
/// For any inputs: every pending create appears exactly once, no id
/// pending delete appears, no id appears twice, and everything else is
/// exactly the snapshot.
pub fn merge_snapshot(
    owner: &OwnerId,
    remote: &[RemoteRecord],
    local: &[Record],
) -> Vec<Record> {
    let pending_delete_ids: HashSet<&RecordId> = local
        .iter()
        .filter(|r| r.status == SyncStatus::PendingDelete)
        .map(|r| &r.id)
        .collect();

    let pending_updates: HashMap<&RecordId, &Record> = local
        .iter()
        .filter(|r| r.status == SyncStatus::PendingUpdate)
        .map(|r| (&r.id, r))
        .collect();

    let mut merged = Vec::with_capacity(remote.len());
    let mut seen: HashSet<RecordId> = HashSet::with_capacity(remote.len());

    for doc in remote {
        let id = RecordId::Remote(doc.id.clone());
        if !seen.insert(id.clone()) {
            continue;
        }
        if pending_delete_ids.contains(&id) {
            continue;
        }
        match pending_updates.get(&id) {
            Some(local_copy) => merged.push((*local_copy).clone()),
            None => merged.push(record_from_remote(owner, doc)),
        }
    }

    merged.extend(
        local
            .iter()
            .filter(|r| r.status == SyncStatus::PendingCreate)
            .cloned(),
    );

    merged
}

/// The locally cached view, before any snapshot has arrived: everything
/// for the owner except records hidden by a pending delete.
pub fn cached_view(local: &[Record]) -> Vec<Record> {
    local
        .iter()
        .filter(|r| r.status != SyncStatus::PendingDelete)
        .cloned()
        .collect()
}
