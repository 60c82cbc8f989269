use larder_store::{LocalStore, StoreError};
use larder_types::{
    Collection, Operation, OwnerId, Payload, QueueStatus, Record, RecordId, RemoteId, SyncStatus,
};

fn payload(name: &str) -> Payload {
    let mut map = Payload::new();
    map.insert("name".to_string(), serde_json::json!(name));
    map.insert("quantity".to_string(), serde_json::json!("1"));
    map
}

fn synced(id: &str, owner: &str, name: &str) -> Record {
    Record::synced(RemoteId::new(id), OwnerId::new(owner), payload(name))
}

// ── Open ─────────────────────────────────────────────────────────

#[test]
fn open_creates_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("larder.db");
    let store = LocalStore::open(&path).unwrap();
    store.put(Collection::Pantry, &synced("d1", "u1", "Eggs")).unwrap();
    assert!(path.exists());
}

#[test]
fn open_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("larder.db");
    {
        let store = LocalStore::open(&path).unwrap();
        store.put(Collection::Pantry, &synced("d1", "u1", "Eggs")).unwrap();
    }
    let store = LocalStore::open(&path).unwrap();
    let record = store
        .get(Collection::Pantry, &RecordId::Remote(RemoteId::new("d1")))
        .unwrap()
        .unwrap();
    assert_eq!(record.payload["name"], "Eggs");
}

#[test]
fn open_unopenable_path_is_unavailable() {
    let err = LocalStore::open(std::path::Path::new("/nonexistent/dir/larder.db")).unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

// ── Records: put/get ─────────────────────────────────────────────

#[test]
fn put_then_get_returns_written_value() {
    let store = LocalStore::open_in_memory().unwrap();
    let record = synced("d1", "u1", "Eggs");
    store.put(Collection::Pantry, &record).unwrap();

    let fetched = store.get(Collection::Pantry, &record.id).unwrap().unwrap();
    assert_eq!(fetched, record);
}

#[test]
fn get_absent_returns_none() {
    let store = LocalStore::open_in_memory().unwrap();
    let got = store
        .get(Collection::Pantry, &RecordId::Remote(RemoteId::new("missing")))
        .unwrap();
    assert!(got.is_none());
}

#[test]
fn put_overwrites_on_conflict() {
    let store = LocalStore::open_in_memory().unwrap();
    store.put(Collection::Pantry, &synced("d1", "u1", "Eggs")).unwrap();
    store.put(Collection::Pantry, &synced("d1", "u1", "Milk")).unwrap();

    let fetched = store
        .get(Collection::Pantry, &RecordId::Remote(RemoteId::new("d1")))
        .unwrap()
        .unwrap();
    assert_eq!(fetched.payload["name"], "Milk");
    assert_eq!(store.count(Collection::Pantry).unwrap(), 1);
}

#[test]
fn collections_are_isolated() {
    let store = LocalStore::open_in_memory().unwrap();
    store.put(Collection::Pantry, &synced("d1", "u1", "Eggs")).unwrap();

    assert!(store
        .get(Collection::Recipes, &RecordId::Remote(RemoteId::new("d1")))
        .unwrap()
        .is_none());
    assert_eq!(store.count(Collection::Recipes).unwrap(), 0);
}

#[test]
fn local_ids_roundtrip_through_storage() {
    let store = LocalStore::open_in_memory().unwrap();
    let record = Record::pending_create(OwnerId::new("u1"), payload("Eggs"));
    store.put(Collection::Pantry, &record).unwrap();

    let fetched = store.get(Collection::Pantry, &record.id).unwrap().unwrap();
    assert!(fetched.id.is_local());
    assert_eq!(fetched, record);
}

// ── Records: secondary indexes ───────────────────────────────────

#[test]
fn get_by_owner_scopes_results() {
    let store = LocalStore::open_in_memory().unwrap();
    store.put(Collection::Pantry, &synced("d1", "u1", "Eggs")).unwrap();
    store.put(Collection::Pantry, &synced("d2", "u1", "Milk")).unwrap();
    store.put(Collection::Pantry, &synced("d3", "u2", "Salt")).unwrap();

    let records = store.get_by_owner(Collection::Pantry, &OwnerId::new("u1")).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.owner.as_str() == "u1"));
}

#[test]
fn get_by_status_scopes_results() {
    let store = LocalStore::open_in_memory().unwrap();
    store.put(Collection::Pantry, &synced("d1", "u1", "Eggs")).unwrap();
    let pending = Record::pending_create(OwnerId::new("u1"), payload("Milk"));
    store.put(Collection::Pantry, &pending).unwrap();

    let records = store
        .get_by_status(Collection::Pantry, SyncStatus::PendingCreate)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, pending.id);
}

// ── Records: put_many / remove / clear ───────────────────────────

#[test]
fn put_many_stores_all_records() {
    let store = LocalStore::open_in_memory().unwrap();
    let records: Vec<Record> = (0..5)
        .map(|i| synced(&format!("d{i}"), "u1", &format!("item-{i}")))
        .collect();
    store.put_many(Collection::Pantry, &records).unwrap();
    assert_eq!(store.count(Collection::Pantry).unwrap(), 5);
}

#[test]
fn put_many_empty_is_noop() {
    let store = LocalStore::open_in_memory().unwrap();
    store.put_many(Collection::Pantry, &[]).unwrap();
    assert_eq!(store.count(Collection::Pantry).unwrap(), 0);
}

#[test]
fn put_many_upserts_within_batch() {
    let store = LocalStore::open_in_memory().unwrap();
    store.put(Collection::Pantry, &synced("d1", "u1", "Eggs")).unwrap();
    store
        .put_many(
            Collection::Pantry,
            &[synced("d1", "u1", "Milk"), synced("d2", "u1", "Salt")],
        )
        .unwrap();

    assert_eq!(store.count(Collection::Pantry).unwrap(), 2);
    let d1 = store
        .get(Collection::Pantry, &RecordId::Remote(RemoteId::new("d1")))
        .unwrap()
        .unwrap();
    assert_eq!(d1.payload["name"], "Milk");
}

#[test]
fn remove_is_idempotent() {
    let store = LocalStore::open_in_memory().unwrap();
    let record = synced("d1", "u1", "Eggs");
    store.put(Collection::Pantry, &record).unwrap();

    store.remove(Collection::Pantry, &record.id).unwrap();
    assert!(store.get(Collection::Pantry, &record.id).unwrap().is_none());

    // Second remove of the same key: no error.
    store.remove(Collection::Pantry, &record.id).unwrap();
}

#[test]
fn clear_empties_only_that_collection() {
    let store = LocalStore::open_in_memory().unwrap();
    store.put(Collection::Pantry, &synced("d1", "u1", "Eggs")).unwrap();
    store.put(Collection::Recipes, &synced("r1", "u1", "Omelette")).unwrap();

    store.clear(Collection::Pantry).unwrap();
    assert_eq!(store.count(Collection::Pantry).unwrap(), 0);
    assert_eq!(store.count(Collection::Recipes).unwrap(), 1);
}

// ── Queue rows ───────────────────────────────────────────────────

fn create_op(owner: &str) -> Operation {
    let record = Record::pending_create(OwnerId::new(owner), payload("Eggs"));
    Operation::create(
        Collection::Pantry,
        OwnerId::new(owner),
        payload("Eggs"),
        record.id.as_local().unwrap(),
    )
}

#[test]
fn queue_ids_ascend_in_enqueue_order() {
    let store = LocalStore::open_in_memory().unwrap();
    let a = store.insert_queue_entry(&create_op("u1")).unwrap();
    let b = store.insert_queue_entry(&create_op("u1")).unwrap();
    let c = store.insert_queue_entry(&create_op("u1")).unwrap();
    assert!(a < b && b < c);

    let entries = store
        .queue_entries_with_status(&[QueueStatus::Pending])
        .unwrap();
    let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![a, b, c]);
}

#[test]
fn inserted_entry_starts_pending_with_zero_retries() {
    let store = LocalStore::open_in_memory().unwrap();
    let id = store.insert_queue_entry(&create_op("u1")).unwrap();
    let entry = store.queue_entry(id).unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::Pending);
    assert_eq!(entry.retry_count, 0);
    assert!(entry.last_error.is_none());
    assert_eq!(entry.collection, "pantry");
}

#[test]
fn claim_moves_pending_to_in_progress_once() {
    let store = LocalStore::open_in_memory().unwrap();
    let id = store.insert_queue_entry(&create_op("u1")).unwrap();

    assert!(store.claim_queue_entry(id).unwrap());
    // Already claimed: a second drain must skip it.
    assert!(!store.claim_queue_entry(id).unwrap());

    let entry = store.queue_entry(id).unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::InProgress);
}

#[test]
fn claim_of_missing_entry_is_false() {
    let store = LocalStore::open_in_memory().unwrap();
    assert!(!store.claim_queue_entry(999).unwrap());
}

#[test]
fn failed_entries_can_be_claimed_again() {
    let store = LocalStore::open_in_memory().unwrap();
    let id = store.insert_queue_entry(&create_op("u1")).unwrap();
    store
        .record_queue_failure(id, QueueStatus::Failed, 1, "remote unreachable")
        .unwrap();

    assert!(store.claim_queue_entry(id).unwrap());
}

#[test]
fn record_queue_failure_updates_bookkeeping() {
    let store = LocalStore::open_in_memory().unwrap();
    let id = store.insert_queue_entry(&create_op("u1")).unwrap();
    store
        .record_queue_failure(id, QueueStatus::Failed, 3, "boom")
        .unwrap();

    let entry = store.queue_entry(id).unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::Failed);
    assert_eq!(entry.retry_count, 3);
    assert_eq!(entry.last_error.as_deref(), Some("boom"));
}

#[test]
fn remove_queue_entry_deletes_row() {
    let store = LocalStore::open_in_memory().unwrap();
    let id = store.insert_queue_entry(&create_op("u1")).unwrap();
    store.remove_queue_entry(id).unwrap();
    assert!(store.queue_entry(id).unwrap().is_none());
}

#[test]
fn reset_failed_respects_retry_budget() {
    let store = LocalStore::open_in_memory().unwrap();
    let retryable = store.insert_queue_entry(&create_op("u1")).unwrap();
    let exhausted = store.insert_queue_entry(&create_op("u1")).unwrap();
    store
        .record_queue_failure(retryable, QueueStatus::Failed, 2, "x")
        .unwrap();
    store
        .record_queue_failure(exhausted, QueueStatus::Failed, 3, "x")
        .unwrap();

    let reset = store.reset_failed_entries(3).unwrap();
    assert_eq!(reset, 1);
    assert_eq!(
        store.queue_entry(retryable).unwrap().unwrap().status,
        QueueStatus::Pending
    );
    assert_eq!(
        store.queue_entry(exhausted).unwrap().unwrap().status,
        QueueStatus::Failed
    );
}

#[test]
fn amend_create_payload_rewrites_unclaimed_entry() {
    let store = LocalStore::open_in_memory().unwrap();
    let record = Record::pending_create(OwnerId::new("u1"), payload("Eggs"));
    let local = record.id.as_local().unwrap();
    let op = Operation::create(Collection::Pantry, OwnerId::new("u1"), payload("Eggs"), local);
    let id = store.insert_queue_entry(&op).unwrap();

    let amended = store.amend_create_payload(local, &payload("Free-range eggs")).unwrap();
    assert!(amended);
    let entry = store.queue_entry(id).unwrap().unwrap();
    assert_eq!(entry.payload.unwrap()["name"], "Free-range eggs");
}

#[test]
fn amend_create_payload_skips_claimed_entry() {
    let store = LocalStore::open_in_memory().unwrap();
    let record = Record::pending_create(OwnerId::new("u1"), payload("Eggs"));
    let local = record.id.as_local().unwrap();
    let op = Operation::create(Collection::Pantry, OwnerId::new("u1"), payload("Eggs"), local);
    let id = store.insert_queue_entry(&op).unwrap();
    store.claim_queue_entry(id).unwrap();

    let amended = store.amend_create_payload(local, &payload("Milk")).unwrap();
    assert!(!amended);
}

#[test]
fn remove_unclaimed_create_cancels_pending_entry() {
    let store = LocalStore::open_in_memory().unwrap();
    let record = Record::pending_create(OwnerId::new("u1"), payload("Eggs"));
    let local = record.id.as_local().unwrap();
    let op = Operation::create(Collection::Pantry, OwnerId::new("u1"), payload("Eggs"), local);
    let id = store.insert_queue_entry(&op).unwrap();

    assert!(store.remove_unclaimed_create(local).unwrap());
    assert!(store.queue_entry(id).unwrap().is_none());
}

#[test]
fn remove_unclaimed_create_leaves_claimed_entry() {
    let store = LocalStore::open_in_memory().unwrap();
    let record = Record::pending_create(OwnerId::new("u1"), payload("Eggs"));
    let local = record.id.as_local().unwrap();
    let op = Operation::create(Collection::Pantry, OwnerId::new("u1"), payload("Eggs"), local);
    let id = store.insert_queue_entry(&op).unwrap();
    store.claim_queue_entry(id).unwrap();

    assert!(!store.remove_unclaimed_create(local).unwrap());
    assert!(store.queue_entry(id).unwrap().is_some());
}

#[test]
fn queue_count_covers_requested_states() {
    let store = LocalStore::open_in_memory().unwrap();
    let a = store.insert_queue_entry(&create_op("u1")).unwrap();
    store.insert_queue_entry(&create_op("u1")).unwrap();
    store
        .record_queue_failure(a, QueueStatus::Failed, 3, "x")
        .unwrap();

    let count = store
        .queue_count_with_status(&[QueueStatus::Pending, QueueStatus::Failed])
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(store.queue_count_with_status(&[QueueStatus::Pending]).unwrap(), 1);
}

#[test]
fn clear_queue_removes_everything() {
    let store = LocalStore::open_in_memory().unwrap();
    store.insert_queue_entry(&create_op("u1")).unwrap();
    store.insert_queue_entry(&create_op("u1")).unwrap();
    store.clear_queue().unwrap();
    assert_eq!(
        store
            .queue_count_with_status(&[QueueStatus::Pending, QueueStatus::Failed])
            .unwrap(),
        0
    );
}
