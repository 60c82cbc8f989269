//! SQLite-backed local store for Larder.
//!
//! Provides durable persistence for entity records and mutation-queue
//! entries, with lookup by primary key and by the two secondary indexes
//! the sync engine needs (owner, sync status).
//!
//! # Architecture
//!
//! - One database file per device, shared by every logical collection
//! - Records are stored as JSON payloads keyed by (collection, id)
//! - Queue rows get an AUTOINCREMENT id that defines drain order
//! - Batch writes run inside a single transaction
//!
//! The store does not assume exclusive ownership: queue rows are handed
//! out through an atomic claim so two concurrent drains never process the
//! same entry twice.

mod error;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::LocalStore;
