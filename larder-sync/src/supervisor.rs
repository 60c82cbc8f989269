//! Reconnect supervision: drains the mutation queue when connectivity
//! returns, and on demand.

use crate::error::SyncResult;
use crate::network::NetworkMonitor;
use larder_queue::{DrainReport, QueueProcessor};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Wires the network monitor to the queue processor.
///
/// A spawned supervisor drains once per offline→online transition; an
/// in-flight drain is never cancelled by anything a subscriber does.
#[derive(Clone)]
pub struct SyncSupervisor {
    monitor: NetworkMonitor,
    processor: Arc<QueueProcessor>,
}

impl SyncSupervisor {
    /// Creates a supervisor.
    pub fn new(monitor: NetworkMonitor, processor: Arc<QueueProcessor>) -> Self {
        Self { monitor, processor }
    }

    /// Drains the queue right now (manual sync).
    pub async fn sync_now(&self) -> SyncResult<DrainReport> {
        Ok(self.processor.drain().await?)
    }

    /// Spawns the reconnect watcher. Aborting the handle stops it; queue
    /// state is untouched either way.
    pub fn spawn(&self) -> JoinHandle<()> {
        let monitor = self.monitor.clone();
        let processor = Arc::clone(&self.processor);

        tokio::spawn(async move {
            let mut connectivity = monitor.watch();
            let mut was_online = monitor.is_online();

            while connectivity.changed().await.is_ok() {
                let online = *connectivity.borrow_and_update();
                if online && !was_online {
                    match processor.drain().await {
                        Ok(report) => {
                            info!(
                                succeeded = report.succeeded,
                                failed = report.failed,
                                "drained queue after reconnect"
                            );
                        }
                        Err(e) => warn!("reconnect drain failed: {e}"),
                    }
                }
                was_online = online;
            }
        })
    }
}
