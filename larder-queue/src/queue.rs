//! The mutation queue: durable FIFO log of writes awaiting the remote.

use crate::error::QueueResult;
use crate::waker::SyncWaker;
use larder_store::LocalStore;
use larder_types::{Operation, QueueEntry, QueueStatus};
use std::sync::Arc;
use tracing::debug;

/// Attempts per entry before it is parked as `Failed`.
pub const MAX_RETRIES: u32 = 3;

/// Ordered, durable log of pending write operations.
///
/// Persistence lives in the [`LocalStore`]; this type adds the queue
/// semantics (what counts as pending, retry budget, wake registration).
#[derive(Clone)]
pub struct MutationQueue {
    store: LocalStore,
    waker: Option<Arc<dyn SyncWaker>>,
}

impl MutationQueue {
    /// Creates a queue over the given store, with no background waker.
    pub fn new(store: LocalStore) -> Self {
        Self { store, waker: None }
    }

    /// Creates a queue that registers a background wake after each
    /// enqueue.
    pub fn with_waker(store: LocalStore, waker: Arc<dyn SyncWaker>) -> Self {
        Self {
            store,
            waker: Some(waker),
        }
    }

    /// Appends an operation as a `Pending` entry and returns its id.
    ///
    /// Wake registration is best-effort: a host without the mechanism, or
    /// a failing one, does not affect the enqueue.
    pub async fn enqueue(&self, op: Operation) -> QueueResult<i64> {
        let id = self.store.insert_queue_entry(&op)?;
        debug!(kind = %op.kind, collection = %op.collection, id, "queued operation");

        if let Some(waker) = &self.waker {
            if let Err(e) = waker.register_wake().await {
                debug!("background wake not available: {e}");
            }
        }

        Ok(id)
    }

    /// Number of entries awaiting a drain (`Pending` or `Failed`).
    pub fn pending_count(&self) -> QueueResult<usize> {
        Ok(self
            .store
            .queue_count_with_status(&[QueueStatus::Pending, QueueStatus::Failed])?)
    }

    /// Entries awaiting a drain, in ascending id order.
    pub fn pending_entries(&self) -> QueueResult<Vec<QueueEntry>> {
        Ok(self
            .store
            .queue_entries_with_status(&[QueueStatus::Pending, QueueStatus::Failed])?)
    }

    /// Resets `Failed` entries with remaining retry budget back to
    /// `Pending`. Returns how many became eligible again.
    pub fn reset_failed_for_retry(&self) -> QueueResult<usize> {
        Ok(self.store.reset_failed_entries(MAX_RETRIES)?)
    }

    /// Removes `Completed` tombstones, if any cleanup pass left them.
    pub fn clear_completed(&self) -> QueueResult<usize> {
        Ok(self.store.clear_queue_with_status(QueueStatus::Completed)?)
    }

    /// Removes every entry, including `Failed` ones. Drops unsynced
    /// mutations — callers own that decision.
    pub fn clear_all(&self) -> QueueResult<()> {
        Ok(self.store.clear_queue()?)
    }

    /// The underlying store handle (shared with the processor).
    pub fn store(&self) -> &LocalStore {
        &self.store
    }
}
