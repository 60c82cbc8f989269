//! Connectivity monitoring.
//!
//! The host platform owns the truth about connectivity and feeds
//! transitions in through [`NetworkMonitor::set_online`]. Consumers read
//! the current state or subscribe to transitions through a watch channel
//! — no ad hoc callbacks.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Clonable handle to the connectivity state.
#[derive(Clone)]
pub struct NetworkMonitor {
    sender: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(initially_online);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Current connectivity.
    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Records a connectivity transition. No-op when the state is
    /// unchanged, so watchers only wake on real transitions.
    pub fn set_online(&self, online: bool) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            debug!(online, "connectivity changed");
        }
    }

    /// Subscribes to connectivity transitions. The current state counts
    /// as seen; only subsequent transitions wake the receiver.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
