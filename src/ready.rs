//! One-shot readiness signal.
//!
//! The client runs an asynchronous identity check once at construction;
//! requests that need the check to have settled wait on this signal. The
//! signal is a flag plus broadcast in one primitive: waiters that subscribe
//! after it has fired are released immediately instead of hanging on a
//! missed event, and firing it again is a no-op.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// One-shot broadcast gate. Cheap to clone; all clones share state.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Mark the signal as fired, waking every current waiter. Idempotent.
    pub fn fire(&self) {
        if !self.tx.send_replace(true) {
            debug!("readiness signal fired");
        }
    }

    /// Whether the signal has fired.
    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Suspend until the signal fires. Returns immediately if it already
    /// has, even for waiters subscribing long after the fire.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so this cannot error out.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}
