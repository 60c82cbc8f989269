//! Durable mutation queue for Larder.
//!
//! Writes that cannot be applied remotely (offline, or the direct attempt
//! failed) land here as ordered, durable queue entries. The processor
//! drains them against the remote backend strictly in enqueue order, one
//! at a time, with retry accounting.
//!
//! The invariant the whole crate exists for: an entry leaves the queue
//! only once its operation is confirmed applied remotely. An entry that
//! exhausts its retries stays visible as `Failed` — data loss is never
//! silent.

mod error;
mod processor;
mod queue;
mod waker;

pub use error::{QueueError, QueueResult};
pub use processor::{DrainReport, QueueProcessor};
pub use queue::{MutationQueue, MAX_RETRIES};
pub use waker::{NoopWaker, SyncWaker, WakeError};
