//! Background wake registration.
//!
//! After an enqueue, the queue asks the host platform — when one is
//! wired in — to wake queue processing later even if the app is no
//! longer in the foreground. Registration is best-effort: a failure is
//! logged and swallowed, never surfaced to the enqueue caller.

use async_trait::async_trait;
use thiserror::Error;

/// Failure to register a background wake. Informational only.
#[derive(Debug, Error)]
#[error("wake registration failed: {0}")]
pub struct WakeError(pub String);

/// Host-platform hook for waking queue processing in the background.
#[async_trait]
pub trait SyncWaker: Send + Sync {
    /// Asks the platform to schedule a queue-processing wake.
    async fn register_wake(&self) -> Result<(), WakeError>;
}

/// A waker for hosts with no background-wake mechanism.
pub struct NoopWaker;

#[async_trait]
impl SyncWaker for NoopWaker {
    async fn register_wake(&self) -> Result<(), WakeError> {
        Ok(())
    }
}
