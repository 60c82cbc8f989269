//! The local store: entity records plus mutation-queue rows.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use larder_types::{
    Collection, LocalId, Operation, OperationKind, OwnerId, Payload, QueueEntry, QueueStatus,
    Record, RecordId, SyncStatus,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Durable local store backed by a single SQLite database.
///
/// The handle is cheap to clone and safe to share; every component that
/// persists anything receives one at construction time.
#[derive(Clone, Debug)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// Fails with [`StoreError::Unavailable`] when the database cannot be
    /// opened or its schema cannot be initialized — terminal for the
    /// session.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("failed to open store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(format!("failed to open in-memory store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                sync_status TEXT NOT NULL,
                payload TEXT NOT NULL,
                added_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_owner
                ON records (collection, owner_id);
            CREATE INDEX IF NOT EXISTS idx_records_status
                ON records (collection, sync_status);

            CREATE TABLE IF NOT EXISTS sync_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                collection TEXT NOT NULL,
                doc_id TEXT,
                local_id TEXT,
                payload TEXT,
                owner_id TEXT NOT NULL,
                queued_at TEXT NOT NULL,
                status TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_queue_status
                ON sync_queue (status);
            ",
        )
        .map_err(|e| StoreError::Unavailable(format!("failed to init schema: {e}")))?;
        Ok(())
    }

    // ── Records ──────────────────────────────────────────────────

    /// Fetches a single record by key. Returns `None` when absent.
    pub fn get(&self, collection: Collection, id: &RecordId) -> StoreResult<Option<Record>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, owner_id, sync_status, payload, added_at
                 FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id.to_string()],
                record_columns,
            )
            .optional()?;
        row.map(parse_record).transpose()
    }

    /// Returns every record in a collection, unordered.
    pub fn get_all(&self, collection: Collection) -> StoreResult<Vec<Record>> {
        self.select_records(
            "SELECT id, owner_id, sync_status, payload, added_at
             FROM records WHERE collection = ?1",
            params![collection.as_str()],
        )
    }

    /// Returns the records owned by one user.
    pub fn get_by_owner(&self, collection: Collection, owner: &OwnerId) -> StoreResult<Vec<Record>> {
        self.select_records(
            "SELECT id, owner_id, sync_status, payload, added_at
             FROM records WHERE collection = ?1 AND owner_id = ?2",
            params![collection.as_str(), owner.as_str()],
        )
    }

    /// Returns the records in one sync state.
    pub fn get_by_status(
        &self,
        collection: Collection,
        status: SyncStatus,
    ) -> StoreResult<Vec<Record>> {
        self.select_records(
            "SELECT id, owner_id, sync_status, payload, added_at
             FROM records WHERE collection = ?1 AND sync_status = ?2",
            params![collection.as_str(), status.as_str()],
        )
    }

    fn select_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Record>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, record_columns)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);
        rows.into_iter().map(parse_record).collect()
    }

    /// Upserts a record, keyed by its id. Overwrites on conflict.
    pub fn put(&self, collection: Collection, record: &Record) -> StoreResult<()> {
        let payload = serde_json::to_string(&record.payload)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO records
                 (collection, id, owner_id, sync_status, payload, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                collection.as_str(),
                record.id.to_string(),
                record.owner.as_str(),
                record.status.as_str(),
                payload,
                record.added_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Upserts a batch of records inside one transaction: either every
    /// record becomes visible or none does.
    pub fn put_many(&self, collection: Collection, records: &[Record]) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO records
                     (collection, id, owner_id, sync_status, payload, added_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                let payload = serde_json::to_string(&record.payload)?;
                stmt.execute(params![
                    collection.as_str(),
                    record.id.to_string(),
                    record.owner.as_str(),
                    record.status.as_str(),
                    payload,
                    record.added_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Removes a record by key. Idempotent; absent keys are no-ops.
    pub fn remove(&self, collection: Collection, id: &RecordId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id.to_string()],
        )?;
        Ok(())
    }

    /// Removes every record in a collection.
    pub fn clear(&self, collection: Collection) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM records WHERE collection = ?1",
            params![collection.as_str()],
        )?;
        Ok(())
    }

    /// Counts the records in a collection.
    pub fn count(&self, collection: Collection) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ── Mutation queue ───────────────────────────────────────────

    /// Appends an operation as a `Pending` queue row and returns its id.
    /// Row ids are monotonically increasing and define drain order.
    pub fn insert_queue_entry(&self, op: &Operation) -> StoreResult<i64> {
        let payload = op
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_queue
                 (kind, collection, doc_id, local_id, payload, owner_id, queued_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                op.kind.as_str(),
                op.collection.as_str(),
                op.doc_id.as_ref().map(|d| d.as_str()),
                op.local_id.map(|l| l.to_string()),
                payload,
                op.owner.as_str(),
                Utc::now().to_rfc3339(),
                QueueStatus::Pending.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetches a single queue entry by id.
    pub fn queue_entry(&self, id: i64) -> StoreResult<Option<QueueEntry>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, kind, collection, doc_id, local_id, payload, owner_id,
                        queued_at, status, retry_count, last_error
                 FROM sync_queue WHERE id = ?1",
                params![id],
                queue_columns,
            )
            .optional()?;
        row.map(parse_queue_entry).transpose()
    }

    /// Returns the queue entries in any of the given states, in ascending
    /// id order (enqueue time is the tie-breaking secondary sort).
    pub fn queue_entries_with_status(
        &self,
        statuses: &[QueueStatus],
    ) -> StoreResult<Vec<QueueEntry>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT id, kind, collection, doc_id, local_id, payload, owner_id,
                    queued_at, status, retry_count, last_error
             FROM sync_queue WHERE status IN ({placeholders})
             ORDER BY id ASC, queued_at ASC"
        );
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params_from_iter(statuses.iter().map(|s| s.as_str())),
                queue_columns,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);
        rows.into_iter().map(parse_queue_entry).collect()
    }

    /// Counts the queue entries in any of the given states.
    pub fn queue_count_with_status(&self, statuses: &[QueueStatus]) -> StoreResult<usize> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!("SELECT COUNT(*) FROM sync_queue WHERE status IN ({placeholders})");
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &sql,
            params_from_iter(statuses.iter().map(|s| s.as_str())),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Atomically claims an entry for processing: `Pending`/`Failed` →
    /// `InProgress`. Returns false when the entry is gone or already
    /// claimed — the caller skips it. This is what makes a second drain
    /// running concurrently safe.
    pub fn claim_queue_entry(&self, id: i64) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE sync_queue SET status = ?1
             WHERE id = ?2 AND status IN (?3, ?4)",
            params![
                QueueStatus::InProgress.as_str(),
                id,
                QueueStatus::Pending.as_str(),
                QueueStatus::Failed.as_str(),
            ],
        )?;
        Ok(changed == 1)
    }

    /// Records a failed attempt: bumps the retry count, stores the
    /// diagnostic, and sets the resulting state (`Pending` for another
    /// pass, `Failed` once the cap is hit).
    pub fn record_queue_failure(
        &self,
        id: i64,
        status: QueueStatus,
        retry_count: u32,
        error: &str,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sync_queue SET status = ?1, retry_count = ?2, last_error = ?3
             WHERE id = ?4",
            params![status.as_str(), retry_count, error, id],
        )?;
        Ok(())
    }

    /// Removes a queue entry. Called only once its operation is confirmed
    /// remotely (or by an explicit clear).
    pub fn remove_queue_entry(&self, id: i64) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Resets `Failed` entries that still have retry budget back to
    /// `Pending`. Returns how many were reset.
    pub fn reset_failed_entries(&self, max_retries: u32) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE sync_queue SET status = ?1
             WHERE status = ?2 AND retry_count < ?3",
            params![
                QueueStatus::Pending.as_str(),
                QueueStatus::Failed.as_str(),
                max_retries,
            ],
        )?;
        Ok(changed)
    }

    /// Replaces the payload of a still-unclaimed `Create` entry linked to
    /// the given local record. Returns false when no such entry exists
    /// (already claimed or confirmed).
    pub fn amend_create_payload(&self, local_id: LocalId, payload: &Payload) -> StoreResult<bool> {
        let json = serde_json::to_string(payload)?;
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE sync_queue SET payload = ?1
             WHERE local_id = ?2 AND kind = ?3 AND status IN (?4, ?5)",
            params![
                json,
                local_id.to_string(),
                OperationKind::Create.as_str(),
                QueueStatus::Pending.as_str(),
                QueueStatus::Failed.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Removes a still-unclaimed `Create` entry linked to the given local
    /// record (the record was deleted before its create ever synced).
    /// Returns false when no such entry exists.
    pub fn remove_unclaimed_create(&self, local_id: LocalId) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM sync_queue
             WHERE local_id = ?1 AND kind = ?2 AND status IN (?3, ?4)",
            params![
                local_id.to_string(),
                OperationKind::Create.as_str(),
                QueueStatus::Pending.as_str(),
                QueueStatus::Failed.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Removes every queue entry in the given state.
    pub fn clear_queue_with_status(&self, status: QueueStatus) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM sync_queue WHERE status = ?1",
            params![status.as_str()],
        )?;
        Ok(changed)
    }

    /// Removes every queue entry regardless of state.
    pub fn clear_queue(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM sync_queue", [])?;
        Ok(())
    }
}

// ── Row mapping ──────────────────────────────────────────────────

type RecordColumns = (String, String, String, String, String);

fn record_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn parse_record((id, owner, status, payload, added_at): RecordColumns) -> StoreResult<Record> {
    let id: RecordId = id
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("bad record id: {e}")))?;
    let status: SyncStatus = status
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("{e}")))?;
    let payload: Payload = serde_json::from_str(&payload)?;
    let added_at = parse_timestamp(&added_at)?;
    Ok(Record {
        id,
        owner: OwnerId::new(owner),
        payload,
        status,
        added_at,
    })
}

type QueueColumns = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
    u32,
    Option<String>,
);

fn queue_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn parse_queue_entry(columns: QueueColumns) -> StoreResult<QueueEntry> {
    let (id, kind, collection, doc_id, local_id, payload, owner, queued_at, status, retry_count, last_error) =
        columns;
    let kind: OperationKind = kind
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("{e}")))?;
    let status: QueueStatus = status
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("{e}")))?;
    let local_id = local_id
        .map(|s| s.parse::<LocalId>())
        .transpose()
        .map_err(|e| StoreError::InvalidData(format!("bad local id: {e}")))?;
    let payload: Option<Payload> = payload.map(|p| serde_json::from_str(&p)).transpose()?;
    let queued_at = parse_timestamp(&queued_at)?;
    Ok(QueueEntry {
        id,
        kind,
        collection,
        doc_id: doc_id.map(larder_types::RemoteId::new),
        local_id,
        payload,
        owner: OwnerId::new(owner),
        queued_at,
        status,
        retry_count,
        last_error,
    })
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp: {e}")))
}
