//! The pantry service: CRUD with offline fallback, and the merged view.
//!
//! This is the only sanctioned access path to pantry data. Callers never
//! learn whether the app was online when they wrote — a failed or
//! impossible remote write degrades to an optimistic local write plus a
//! queue entry, transparently.

use crate::error::{SyncError, SyncResult};
use crate::merge::{cached_view, merge_snapshot, record_from_remote};
use crate::network::NetworkMonitor;
use larder_queue::MutationQueue;
use larder_remote::{RemoteBackend, RemoteRecord, Subscription};
use larder_store::LocalStore;
use larder_types::{
    Collection, LocalId, Operation, OwnerId, Payload, Record, RecordId, SyncStatus,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where a delivered snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// The locally cached view, delivered before any remote contact.
    Cache,
    /// A merged view built from a fresh remote snapshot.
    Network,
}

/// Typed events delivered to a pantry subscriber.
#[derive(Debug, Clone)]
pub enum PantryEvent {
    /// A full view of the owner's pantry.
    Snapshot {
        items: Vec<Record>,
        origin: SnapshotOrigin,
    },
    /// The remote change stream came up or went away.
    Connectivity(bool),
}

/// A live pantry subscription.
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) aborts the
/// backing task, which synchronously stops event delivery and releases
/// the remote change-stream handle and the connectivity watch.
pub struct PantrySubscription {
    events: mpsc::UnboundedReceiver<PantryEvent>,
    task: JoinHandle<()>,
}

impl PantrySubscription {
    /// Receives the next event. Returns `None` once the subscription is
    /// torn down.
    pub async fn recv(&mut self) -> Option<PantryEvent> {
        self.events.recv().await
    }

    /// Tears the subscription down.
    pub fn unsubscribe(self) {}
}

impl Drop for PantrySubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The pantry entity service.
#[derive(Clone)]
pub struct PantryService {
    store: LocalStore,
    queue: MutationQueue,
    monitor: NetworkMonitor,
    backend: Arc<dyn RemoteBackend>,
}

impl PantryService {
    /// Creates a service over explicit handles. Tests pass isolated
    /// stores and mock backends; production wires the real ones.
    pub fn new(
        store: LocalStore,
        queue: MutationQueue,
        monitor: NetworkMonitor,
        backend: Arc<dyn RemoteBackend>,
    ) -> Self {
        Self {
            store,
            queue,
            monitor,
            backend,
        }
    }

    // ── Subscription ─────────────────────────────────────────────

    /// Subscribes to the owner's pantry.
    ///
    /// The cached local view is delivered first (origin `Cache`); while
    /// online, every remote snapshot is merged with pending local state
    /// and delivered with origin `Network`. Disconnect tears the remote
    /// stream down without touching cached or pending state; reconnect
    /// re-opens it.
    pub fn subscribe(&self, owner: OwnerId) -> SyncResult<PantrySubscription> {
        let (tx, rx) = mpsc::unbounded_channel();

        let cached = self.store.get_by_owner(Collection::Pantry, &owner)?;
        let _ = tx.send(PantryEvent::Snapshot {
            items: cached_view(&cached),
            origin: SnapshotOrigin::Cache,
        });

        let service = self.clone();
        let task = tokio::spawn(async move {
            service.run_subscription(owner, tx).await;
        });

        Ok(PantrySubscription { events: rx, task })
    }

    async fn run_subscription(&self, owner: OwnerId, tx: mpsc::UnboundedSender<PantryEvent>) {
        let mut connectivity = self.monitor.watch();
        let mut stream: Option<Subscription> = None;

        if self.monitor.is_online() {
            stream = self.open_stream(&owner, &tx).await;
        }

        loop {
            tokio::select! {
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        // Monitor gone; nothing will ever change again.
                        break;
                    }
                    let online = *connectivity.borrow_and_update();
                    if tx.send(PantryEvent::Connectivity(online)).is_err() {
                        break;
                    }
                    if online {
                        stream = self.open_stream(&owner, &tx).await;
                    } else {
                        // Tear down the remote stream; cached and pending
                        // local state stay put.
                        stream = None;
                    }
                }
                delivery = next_snapshot(&mut stream) => {
                    match delivery {
                        Some(Ok(records)) => {
                            if !self.handle_snapshot(&owner, records, &tx) {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!("change stream error: {e}");
                            if tx.send(PantryEvent::Connectivity(false)).is_err() {
                                break;
                            }
                        }
                        None => {
                            debug!("change stream closed");
                            stream = None;
                        }
                    }
                }
            }
        }
    }

    async fn open_stream(
        &self,
        owner: &OwnerId,
        tx: &mpsc::UnboundedSender<PantryEvent>,
    ) -> Option<Subscription> {
        match self.backend.subscribe(Collection::Pantry, owner).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("failed to open change stream: {e}");
                let _ = tx.send(PantryEvent::Connectivity(false));
                None
            }
        }
    }

    /// Caches the raw snapshot, merges it with pending local state, and
    /// delivers the result. Returns false when the subscriber is gone.
    fn handle_snapshot(
        &self,
        owner: &OwnerId,
        records: Vec<RemoteRecord>,
        tx: &mpsc::UnboundedSender<PantryEvent>,
    ) -> bool {
        let local = match self.store.get_by_owner(Collection::Pantry, owner) {
            Ok(local) => local,
            Err(e) => {
                // Degrade to the raw snapshot rather than dropping it.
                warn!("failed to read local state for merge: {e}");
                let items = records.iter().map(|r| record_from_remote(owner, r)).collect();
                return tx
                    .send(PantryEvent::Snapshot {
                        items,
                        origin: SnapshotOrigin::Network,
                    })
                    .is_ok();
            }
        };

        let merged = merge_snapshot(owner, &records, &local);

        if let Err(e) = self.cache_snapshot(owner, &records, &local) {
            warn!("failed to refresh snapshot cache: {e}");
        }

        tx.send(PantryEvent::Snapshot {
            items: merged,
            origin: SnapshotOrigin::Network,
        })
        .is_ok()
    }

    /// Replaces previously-synced rows with the fresh snapshot. Records
    /// in any pending state are preserved untouched — their local copy is
    /// the source of truth until the queue confirms them.
    fn cache_snapshot(
        &self,
        owner: &OwnerId,
        records: &[RemoteRecord],
        local: &[Record],
    ) -> SyncResult<()> {
        let pending_ids: HashSet<&RecordId> = local
            .iter()
            .filter(|r| r.is_pending())
            .map(|r| &r.id)
            .collect();

        for record in local.iter().filter(|r| !r.is_pending()) {
            self.store.remove(Collection::Pantry, &record.id)?;
        }

        let fresh: Vec<Record> = records
            .iter()
            .filter(|doc| !pending_ids.contains(&RecordId::Remote(doc.id.clone())))
            .map(|doc| record_from_remote(owner, doc))
            .collect();
        self.store.put_many(Collection::Pantry, &fresh)?;
        Ok(())
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Adds a pantry item. Works offline.
    ///
    /// Online, the create goes straight to the backend and the confirmed
    /// record is returned. Otherwise (or when the direct attempt fails)
    /// the record gets a temporary id, is stored as `PendingCreate`, and
    /// a `Create` operation is queued.
    pub async fn add(&self, item: Payload, owner: &OwnerId) -> SyncResult<Record> {
        let mut payload = item;
        payload.insert(
            "ownerId".to_string(),
            serde_json::json!(owner.as_str()),
        );
        payload.insert(
            "addedAt".to_string(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );

        if self.monitor.is_online() {
            match self.backend.create(Collection::Pantry, &payload).await {
                Ok(remote_id) => {
                    let record = Record::synced(remote_id, owner.clone(), payload);
                    self.store.put(Collection::Pantry, &record)?;
                    debug!(id = %record.id, "added item directly");
                    return Ok(record);
                }
                Err(e) => {
                    warn!("direct create failed, queueing: {e}");
                }
            }
        }

        let local_id = LocalId::new();
        let record = Record {
            id: RecordId::Local(local_id),
            owner: owner.clone(),
            payload: payload.clone(),
            status: SyncStatus::PendingCreate,
            added_at: Utc::now(),
        };
        self.store.put(Collection::Pantry, &record)?;
        self.queue
            .enqueue(Operation::create(
                Collection::Pantry,
                owner.clone(),
                payload,
                local_id,
            ))
            .await?;
        info!(id = %record.id, "added item offline");
        Ok(record)
    }

    /// Updates a pantry item in place. Works offline.
    ///
    /// A record still awaiting its create is rewritten locally and its
    /// queued create payload amended. A synced record gets a direct
    /// remote update when online, else is stored as `PendingUpdate` with
    /// an `Update` operation queued.
    pub async fn update(
        &self,
        id: &RecordId,
        item: Payload,
        owner: &OwnerId,
    ) -> SyncResult<Record> {
        let existing = self
            .store
            .get(Collection::Pantry, id)?
            .ok_or_else(|| SyncError::RecordNotFound(id.to_string()))?;

        let mut payload = item;
        payload.insert(
            "ownerId".to_string(),
            serde_json::json!(owner.as_str()),
        );
        if let Some(added) = existing.payload.get("addedAt") {
            payload.insert("addedAt".to_string(), added.clone());
        }

        match id {
            RecordId::Local(local_id) => {
                let record = Record {
                    payload: payload.clone(),
                    ..existing
                };
                self.store.put(Collection::Pantry, &record)?;
                if !self.store.amend_create_payload(*local_id, &payload)? {
                    // Create already claimed or confirmed; the next
                    // snapshot reconciles.
                    debug!(id = %record.id, "create in flight, local rewrite only");
                }
                Ok(record)
            }
            RecordId::Remote(remote_id) => {
                if self.monitor.is_online() {
                    match self
                        .backend
                        .update(Collection::Pantry, remote_id, &payload)
                        .await
                    {
                        Ok(()) => {
                            let record = Record {
                                payload,
                                status: SyncStatus::Synced,
                                ..existing
                            };
                            self.store.put(Collection::Pantry, &record)?;
                            debug!(id = %record.id, "updated item directly");
                            return Ok(record);
                        }
                        Err(e) => {
                            warn!("direct update failed, queueing: {e}");
                        }
                    }
                }

                let record = Record {
                    payload: payload.clone(),
                    status: SyncStatus::PendingUpdate,
                    ..existing
                };
                self.store.put(Collection::Pantry, &record)?;
                self.queue
                    .enqueue(Operation::update(
                        Collection::Pantry,
                        owner.clone(),
                        remote_id.clone(),
                        payload,
                    ))
                    .await?;
                info!(id = %record.id, "updated item offline");
                Ok(record)
            }
        }
    }

    /// Deletes a pantry item. Works offline, and is idempotent: deleting
    /// an id that is already gone (or already pending delete) neither
    /// errors nor queues anything.
    pub async fn delete(&self, id: &RecordId, owner: &OwnerId) -> SyncResult<()> {
        match id {
            RecordId::Local(local_id) => {
                // Never synced: nothing remote to delete. Drop the local
                // record and cancel its queued create.
                self.store.remove(Collection::Pantry, id)?;
                self.store.remove_unclaimed_create(*local_id)?;
                debug!(%id, "deleted unsynced item");
                Ok(())
            }
            RecordId::Remote(remote_id) => {
                if self.monitor.is_online() {
                    match self.backend.delete(Collection::Pantry, remote_id).await {
                        Ok(()) => {
                            self.store.remove(Collection::Pantry, id)?;
                            debug!(%id, "deleted item directly");
                            return Ok(());
                        }
                        Err(e) => {
                            warn!("direct delete failed, queueing: {e}");
                        }
                    }
                }

                match self.store.get(Collection::Pantry, id)? {
                    Some(existing) if existing.status != SyncStatus::PendingDelete => {
                        self.store.put(
                            Collection::Pantry,
                            &existing.with_status(SyncStatus::PendingDelete),
                        )?;
                        self.queue
                            .enqueue(Operation::delete(
                                Collection::Pantry,
                                owner.clone(),
                                remote_id.clone(),
                            ))
                            .await?;
                        info!(%id, "deleted item offline");
                    }
                    _ => {
                        // Already hidden or fully gone; a second delete
                        // must not queue a second operation.
                        debug!(%id, "delete already pending or record gone");
                    }
                }
                Ok(())
            }
        }
    }

    // ── Status surfaces ──────────────────────────────────────────

    /// Records of this owner still awaiting remote confirmation.
    /// Feeds pending-change indicators in the UI.
    pub fn pending_items(&self, owner: &OwnerId) -> SyncResult<Vec<Record>> {
        Ok(self
            .store
            .get_by_owner(Collection::Pantry, owner)?
            .into_iter()
            .filter(Record::is_pending)
            .collect())
    }
}

/// Resolves the next snapshot from an optional stream; pends forever when
/// there is none (the select loop then only wakes on connectivity).
async fn next_snapshot(
    stream: &mut Option<Subscription>,
) -> Option<larder_remote::SnapshotResult> {
    match stream {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
