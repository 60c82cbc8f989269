//! The queue processor: applies pending mutations to the remote backend.

use crate::error::{QueueError, QueueResult};
use crate::queue::MAX_RETRIES;
use chrono::Utc;
use larder_remote::RemoteBackend;
use larder_store::LocalStore;
use larder_types::{
    Collection, OperationKind, QueueEntry, QueueStatus, Record, RecordId, SyncStatus,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries confirmed remotely and removed from the queue.
    pub succeeded: usize,
    /// Entries that failed this pass (retried later or parked `Failed`).
    pub failed: usize,
}

/// Drains the mutation queue against the remote backend.
///
/// Entries are processed strictly in ascending id order, one at a time —
/// concurrent application could reorder two operations against the same
/// record. A second drain running at the same time is safe: each entry is
/// claimed atomically and a lost claim is skipped.
pub struct QueueProcessor {
    store: LocalStore,
    backend: Arc<dyn RemoteBackend>,
    max_retries: u32,
}

impl QueueProcessor {
    /// Creates a processor with the default retry cap.
    pub fn new(store: LocalStore, backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            store,
            backend,
            max_retries: MAX_RETRIES,
        }
    }

    /// Overrides the retry cap (tests mostly).
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Processes every currently pending entry once, in order.
    pub async fn drain(&self) -> QueueResult<DrainReport> {
        self.drain_with_progress(|_, _| {}).await
    }

    /// Like [`drain`](Self::drain), reporting `(processed, total)` after
    /// each entry.
    ///
    /// The work list is snapshotted up front: entries enqueued while the
    /// drain runs wait for the next pass. `Failed` entries are not picked
    /// up — they stay parked until an explicit
    /// [`reset_failed_for_retry`](crate::MutationQueue::reset_failed_for_retry).
    pub async fn drain_with_progress<F>(&self, mut progress: F) -> QueueResult<DrainReport>
    where
        F: FnMut(usize, usize),
    {
        let pending = self
            .store
            .queue_entries_with_status(&[QueueStatus::Pending])?;
        let total = pending.len();
        let mut report = DrainReport::default();

        if total == 0 {
            return Ok(report);
        }
        info!("processing {total} pending operations");

        for (index, entry) in pending.into_iter().enumerate() {
            if !self.store.claim_queue_entry(entry.id)? {
                // Another drain got here first.
                progress(index + 1, total);
                continue;
            }

            // Re-read after the claim: the payload may have been amended
            // since the snapshot was taken.
            let entry = match self.store.queue_entry(entry.id)? {
                Some(entry) => entry,
                None => {
                    progress(index + 1, total);
                    continue;
                }
            };

            match self.apply(&entry).await {
                Ok(()) => {
                    self.store.remove_queue_entry(entry.id)?;
                    report.succeeded += 1;
                    debug!(id = entry.id, kind = %entry.kind, "synced queue entry");
                }
                Err(e) => {
                    let retry_count = entry.retry_count + 1;
                    let status = if retry_count >= self.max_retries {
                        QueueStatus::Failed
                    } else {
                        QueueStatus::Pending
                    };
                    warn!(id = entry.id, "failed to sync queue entry: {e}");
                    self.store
                        .record_queue_failure(entry.id, status, retry_count, &e.to_string())?;
                    report.failed += 1;
                }
            }

            progress(index + 1, total);
        }

        Ok(report)
    }

    /// Applies one entry remotely and finalizes the local record's sync
    /// state. Finalization touches status and existence only — payload
    /// content is the entity service's business.
    async fn apply(&self, entry: &QueueEntry) -> QueueResult<()> {
        let collection: Collection = entry
            .collection
            .parse()
            .map_err(|_| QueueError::UnknownCollection(entry.collection.clone()))?;

        match entry.kind {
            OperationKind::Create => {
                let mut payload = entry.payload.clone().unwrap_or_default();
                payload.insert(
                    "createdAt".to_string(),
                    serde_json::json!(Utc::now().to_rfc3339()),
                );
                let remote_id = self.backend.create(collection, &payload).await?;

                // The optimistic record is confirmed: retire the temp row
                // and store the document under its server id.
                if let Some(local_id) = entry.local_id {
                    self.store
                        .remove(collection, &RecordId::Local(local_id))?;
                }
                let confirmed = Record {
                    id: RecordId::Remote(remote_id),
                    owner: entry.owner.clone(),
                    payload,
                    status: SyncStatus::Synced,
                    added_at: entry.queued_at,
                };
                self.store.put(collection, &confirmed)?;
                Ok(())
            }

            OperationKind::Update => {
                let doc_id = entry.doc_id.as_ref().ok_or(QueueError::MissingTarget)?;
                let mut payload = entry.payload.clone().unwrap_or_default();
                payload.insert(
                    "updatedAt".to_string(),
                    serde_json::json!(Utc::now().to_rfc3339()),
                );
                self.backend.update(collection, doc_id, &payload).await?;

                let id = RecordId::Remote(doc_id.clone());
                if let Some(record) = self.store.get(collection, &id)? {
                    if record.status == SyncStatus::PendingUpdate {
                        self.store
                            .put(collection, &record.with_status(SyncStatus::Synced))?;
                    }
                }
                Ok(())
            }

            OperationKind::Delete => {
                let doc_id = entry.doc_id.as_ref().ok_or(QueueError::MissingTarget)?;
                self.backend.delete(collection, doc_id).await?;
                self.store
                    .remove(collection, &RecordId::Remote(doc_id.clone()))?;
                Ok(())
            }
        }
    }
}
