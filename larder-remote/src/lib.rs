//! Remote document-store interface for Larder.
//!
//! The sync engine consumes the remote backend as an opaque document
//! store: create/update/delete per logical collection, plus a change
//! stream of full record sets filtered by owner. This crate defines that
//! interface and ships two implementations:
//!
//! - [`mock::MockBackend`] — an in-memory store with scripted failures,
//!   used by the engine's own tests
//! - [`RestBackend`] — an adapter for a JSON document-store API, with a
//!   polling change stream
//!
//! Failure causes are deliberately not distinguished: a network partition
//! and a server-side rejection both surface as
//! [`RemoteError::Unreachable`], and the queue retries them identically.

mod backend;
mod error;
mod rest;

pub use backend::{mock, RemoteBackend, RemoteRecord, SnapshotResult, Subscription};
pub use error::{RemoteError, RemoteResult};
pub use rest::{RestBackend, RestConfig};
