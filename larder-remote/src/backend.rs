//! The remote backend trait and its change-stream subscription.

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use larder_types::{Collection, OwnerId, Payload, RemoteId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A document as reported by the remote backend: server id plus the
/// application fields, verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Server-issued document id.
    pub id: RemoteId,
    /// Application fields.
    #[serde(flatten)]
    pub payload: Payload,
}

/// One delivery on a change stream: a full record set, or an error
/// carried in-band (the stream stays open across errors).
pub type SnapshotResult = RemoteResult<Vec<RemoteRecord>>;

/// A cancelable change-stream subscription.
///
/// Dropping the subscription (or calling [`Subscription::close`]) stops
/// delivery and tears down any backing poll task.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<SnapshotResult>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wraps a snapshot receiver and, optionally, the task feeding it.
    pub fn new(
        receiver: mpsc::UnboundedReceiver<SnapshotResult>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self { receiver, task }
    }

    /// Receives the next snapshot delivery. Returns `None` once the
    /// stream is closed.
    pub async fn recv(&mut self) -> Option<SnapshotResult> {
        self.receiver.recv().await
    }

    /// Explicitly tears the subscription down.
    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The remote document store, as consumed by the sync engine.
///
/// Implementations resolve logical collection names to whatever the
/// backing service calls them; callers never see remote naming.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Creates a document and returns its server-issued id.
    async fn create(&self, collection: Collection, payload: &Payload) -> RemoteResult<RemoteId>;

    /// Updates an existing document in place.
    async fn update(
        &self,
        collection: Collection,
        doc_id: &RemoteId,
        payload: &Payload,
    ) -> RemoteResult<()>;

    /// Deletes a document.
    async fn delete(&self, collection: Collection, doc_id: &RemoteId) -> RemoteResult<()>;

    /// Opens a change stream of full record sets for one owner.
    /// The initial state is delivered as the first snapshot.
    async fn subscribe(
        &self,
        collection: Collection,
        owner: &OwnerId,
    ) -> RemoteResult<Subscription>;
}

/// An in-memory backend for testing.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Payload key the mock reads to scope documents by owner.
    const OWNER_FIELD: &str = "ownerId";

    struct MockState {
        docs: HashMap<Collection, Vec<(RemoteId, Payload)>>,
        subscribers: Vec<(Collection, OwnerId, mpsc::UnboundedSender<SnapshotResult>)>,
        calls: Vec<String>,
        next_id: u64,
        unreachable: bool,
        fail_next: u32,
    }

    impl MockState {
        fn check_reachable(&mut self) -> RemoteResult<()> {
            if self.unreachable {
                return Err(RemoteError::Unreachable("mock offline".to_string()));
            }
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return Err(RemoteError::Unreachable("mock scripted failure".to_string()));
            }
            Ok(())
        }
    }

    /// A scriptable in-memory document store.
    ///
    /// Mutations apply to an owned map and push fresh snapshots to
    /// matching subscribers, like a real change stream would. Tests can
    /// seed documents, force failures, and emit arbitrary (including
    /// stale) snapshots.
    #[derive(Clone)]
    pub struct MockBackend {
        state: Arc<Mutex<MockState>>,
    }

    impl MockBackend {
        /// Creates an empty mock backend.
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(MockState {
                    docs: HashMap::new(),
                    subscribers: Vec::new(),
                    calls: Vec::new(),
                    next_id: 1,
                    unreachable: false,
                    fail_next: 0,
                })),
            }
        }

        /// Makes every subsequent call fail (or succeed again).
        pub fn set_unreachable(&self, unreachable: bool) {
            self.state.lock().unwrap().unreachable = unreachable;
        }

        /// Makes the next `n` calls fail, then recover.
        pub fn fail_next(&self, n: u32) {
            self.state.lock().unwrap().fail_next = n;
        }

        /// Seeds a document without recording a call or notifying
        /// subscribers.
        pub fn seed(&self, collection: Collection, id: impl Into<RemoteId>, payload: Payload) {
            let mut state = self.state.lock().unwrap();
            state.docs.entry(collection).or_default().push((id.into(), payload));
        }

        /// Returns the current documents in a collection.
        pub fn docs(&self, collection: Collection) -> Vec<RemoteRecord> {
            let state = self.state.lock().unwrap();
            state
                .docs
                .get(&collection)
                .map(|docs| {
                    docs.iter()
                        .map(|(id, payload)| RemoteRecord {
                            id: id.clone(),
                            payload: payload.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        }

        /// Every successful call so far, in order, as
        /// `"<kind> <collection> <target>"` strings.
        pub fn calls(&self) -> Vec<String> {
            self.state.lock().unwrap().calls.clone()
        }

        /// Pushes the current state of a collection to matching
        /// subscribers.
        pub fn emit_current(&self, collection: Collection, owner: &OwnerId) {
            let records = self.owned_docs(collection, owner);
            self.push_snapshot(collection, owner, records);
        }

        /// Pushes an arbitrary record set to matching subscribers —
        /// including deliberately stale ones.
        pub fn push_snapshot(
            &self,
            collection: Collection,
            owner: &OwnerId,
            records: Vec<RemoteRecord>,
        ) {
            let mut state = self.state.lock().unwrap();
            state.subscribers.retain(|(c, o, tx)| {
                if *c == collection && o == owner {
                    tx.send(Ok(records.clone())).is_ok()
                } else {
                    true
                }
            });
        }

        /// Pushes an error to matching subscribers (the stream stays
        /// open).
        pub fn push_error(&self, collection: Collection, owner: &OwnerId, error: RemoteError) {
            let mut state = self.state.lock().unwrap();
            state.subscribers.retain(|(c, o, tx)| {
                if *c == collection && o == owner {
                    tx.send(Err(error.clone())).is_ok()
                } else {
                    true
                }
            });
        }

        fn owned_docs(&self, collection: Collection, owner: &OwnerId) -> Vec<RemoteRecord> {
            let state = self.state.lock().unwrap();
            state
                .docs
                .get(&collection)
                .map(|docs| {
                    docs.iter()
                        .filter(|(_, payload)| {
                            payload
                                .get(OWNER_FIELD)
                                .and_then(|v| v.as_str())
                                .is_some_and(|o| o == owner.as_str())
                        })
                        .map(|(id, payload)| RemoteRecord {
                            id: id.clone(),
                            payload: payload.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        }

        fn notify_owner(&self, collection: Collection, payload: &Payload) {
            if let Some(owner) = payload.get(OWNER_FIELD).and_then(|v| v.as_str()) {
                let owner = OwnerId::new(owner);
                self.emit_current(collection, &owner);
            }
        }
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl RemoteBackend for MockBackend {
        async fn create(
            &self,
            collection: Collection,
            payload: &Payload,
        ) -> RemoteResult<RemoteId> {
            let id = {
                let mut state = self.state.lock().unwrap();
                state.check_reachable()?;
                let id = RemoteId::new(format!("r-{}", state.next_id));
                state.next_id += 1;
                state
                    .docs
                    .entry(collection)
                    .or_default()
                    .push((id.clone(), payload.clone()));
                state.calls.push(format!("create {collection} {id}"));
                id
            };
            self.notify_owner(collection, payload);
            Ok(id)
        }

        async fn update(
            &self,
            collection: Collection,
            doc_id: &RemoteId,
            payload: &Payload,
        ) -> RemoteResult<()> {
            {
                let mut state = self.state.lock().unwrap();
                state.check_reachable()?;
                let docs = state.docs.entry(collection).or_default();
                let Some(doc) = docs.iter_mut().find(|(id, _)| id == doc_id) else {
                    return Err(RemoteError::Unreachable(format!(
                        "no such document: {doc_id}"
                    )));
                };
                doc.1 = payload.clone();
                state.calls.push(format!("update {collection} {doc_id}"));
            }
            self.notify_owner(collection, payload);
            Ok(())
        }

        async fn delete(&self, collection: Collection, doc_id: &RemoteId) -> RemoteResult<()> {
            let owner_payload = {
                let mut state = self.state.lock().unwrap();
                state.check_reachable()?;
                let docs = state.docs.entry(collection).or_default();
                let removed = docs.iter().position(|(id, _)| id == doc_id).map(|i| docs.remove(i));
                state.calls.push(format!("delete {collection} {doc_id}"));
                removed.map(|(_, payload)| payload)
            };
            if let Some(payload) = owner_payload {
                self.notify_owner(collection, &payload);
            }
            Ok(())
        }

        async fn subscribe(
            &self,
            collection: Collection,
            owner: &OwnerId,
        ) -> RemoteResult<Subscription> {
            let (tx, rx) = mpsc::unbounded_channel();
            {
                let mut state = self.state.lock().unwrap();
                state.check_reachable()?;
                state.subscribers.push((collection, owner.clone(), tx));
            }
            // Initial snapshot, like a real change stream.
            self.emit_current(collection, owner);
            Ok(Subscription::new(rx, None))
        }
    }
}
