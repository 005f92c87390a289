//! Shutdown coordination for the relay.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Process-wide running flag.
///
/// Cloning is cheap and every clone observes the same flag. Workers poll
/// [`Shutdown::is_running`] once per relay iteration and may also await
/// [`Shutdown::cancelled`] to cut a sleep short.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking check of the running flag.
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        if self.is_running() {
            tracing::info!("Shutdown triggered");
        }
        self.token.cancel();
    }

    /// Resolves once shutdown has been triggered.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
