//! Offline-first sync engine for Larder pantry data.
//!
//! The pantry service is the single authority the rest of the application
//! talks to for reading and mutating pantry data; it hides whether the
//! app is currently online. Writes apply optimistically to the local
//! store, go straight to the remote backend when possible, and fall back
//! to the mutation queue otherwise. Remote snapshots are merged against
//! whatever is still pending locally before anyone sees them.
//!
//! # Components
//!
//! - **NetworkMonitor**: connectivity state plus a watch channel of
//!   transitions, fed by the host platform
//! - **merge**: the pure rule combining an authoritative remote snapshot
//!   with locally pending mutations into one consistent view
//! - **PantryService**: subscribe / add / update / delete with offline
//!   fallback
//! - **SyncSupervisor**: drains the mutation queue on reconnect and on
//!   demand
//! - **RecipeCache / MealPlanCache**: offline-only collection caches
//!   riding on the same local store
//!
//! # Data flow
//!
//! user action → optimistic local write → direct remote write when
//! online, queue entry otherwise → remote change stream pushes
//! authoritative state back → merge against pending local state →
//! merged view delivered to subscribers.

mod error;
mod meal_plans;
pub mod merge;
mod network;
mod pantry;
mod recipes;
mod supervisor;

pub use error::{SyncError, SyncResult};
pub use meal_plans::MealPlanCache;
pub use network::NetworkMonitor;
pub use pantry::{PantryEvent, PantryService, PantrySubscription, SnapshotOrigin};
pub use recipes::RecipeCache;
pub use supervisor::SyncSupervisor;
