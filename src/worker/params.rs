//! Per-worker parameter block and shared worker context.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UnixStream;

use crate::config::{ConnectionParams, RelayConfig};
use crate::filter::FilterFactory;
use crate::lifecycle::Shutdown;
use crate::net::ConnectionId;
use crate::pool::{PoolCoordinator, SlotId, StartupBarrier};

/// Everything one worker needs for its connection.
///
/// Built by the controller for each accepted connection and moved into the
/// worker task; the controller keeps no copy.
#[derive(Debug)]
pub struct WorkerParams {
    pub connection_id: ConnectionId,
    /// The accepted, client-facing socket.
    pub upstream: UnixStream,
    pub slot: SlotId,
    pub server_params: Arc<ConnectionParams>,
    pub pool: Arc<PoolCoordinator>,
    /// Barrier of the cohort this worker was spawned in.
    pub startup: Arc<StartupBarrier>,
}

/// Process-wide collaborators and timings shared by every worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub filters: Arc<dyn FilterFactory>,
    pub shutdown: Shutdown,
    /// Pause after an idle relay step.
    pub idle_wait: Duration,
    pub connect_timeout: Duration,
}

impl WorkerContext {
    pub fn new(filters: Arc<dyn FilterFactory>, shutdown: Shutdown, config: &RelayConfig) -> Self {
        Self {
            filters,
            shutdown,
            idle_wait: config.relay.idle_wait(),
            connect_timeout: config.timeouts.connect(),
        }
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("running", &self.shutdown.is_running())
            .field("idle_wait", &self.idle_wait)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
