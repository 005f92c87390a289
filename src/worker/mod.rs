//! Connection worker: one per accepted connection.
//!
//! # Lifecycle
//! ```text
//! Initializing → Connected → Relaying → TearingDown → Done
//!      │             │                       ▲
//!      │ connect     │ filter init           │
//!      └── fails ────┴── fails ──────────────┘
//! ```
//!
//! Teardown always runs, in fixed order: finalize filter → close downstream
//! → close upstream → mark slot joining. Nothing is returned to the
//! controller except the report; every failure is handled here.

pub mod params;
pub mod relay;

use std::path::Path;
use std::sync::Arc;

use tokio::net::UnixStream;

use crate::config::ConnectionParams;
use crate::filter::Filter;
use crate::net::{connect_downstream, ConnectionId};
use crate::observability::metrics;
use crate::pool::{PoolCoordinator, SlotId};

pub use params::{WorkerContext, WorkerParams};
pub use relay::{run_relay, RelayExit, RelayStats, IDLE_STRIKE_LIMIT};

/// Lifecycle phase of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Initializing,
    Connected,
    Relaying,
    TearingDown,
    Done,
}

/// Why a worker finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The downstream peer could not be reached; no filter was created.
    DownstreamUnavailable,
    /// The filter could not be initialized; nothing was relayed.
    FilterInitFailed,
    /// The relay loop ran and stopped for the given reason.
    Relay(RelayExit),
}

impl WorkerExit {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            WorkerExit::DownstreamUnavailable => "downstream_unavailable",
            WorkerExit::FilterInitFailed => "filter_init_failed",
            WorkerExit::Relay(RelayExit::IdleTimeout) => "idle_timeout",
            WorkerExit::Relay(RelayExit::StepError) => "step_error",
            WorkerExit::Relay(RelayExit::Shutdown) => "shutdown",
        }
    }
}

/// Summary of a finished worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub connection_id: ConnectionId,
    pub slot: SlotId,
    pub exit: WorkerExit,
    pub stats: RelayStats,
    /// Phases in the order they were entered.
    pub phases: Vec<WorkerPhase>,
}

struct Worker {
    connection_id: ConnectionId,
    slot: SlotId,
    server_params: Arc<ConnectionParams>,
    pool: Arc<PoolCoordinator>,
    upstream: UnixStream,
    downstream: Option<UnixStream>,
    filter: Option<Box<dyn Filter>>,
    phases: Vec<WorkerPhase>,
}

/// Run one worker from hand-off to slot release.
pub async fn run_worker(params: WorkerParams, ctx: WorkerContext) -> WorkerReport {
    let WorkerParams {
        connection_id,
        upstream,
        slot,
        server_params,
        pool,
        startup,
    } = params;

    let mut worker = Worker {
        connection_id,
        slot,
        server_params,
        pool,
        upstream,
        downstream: None,
        filter: None,
        phases: vec![WorkerPhase::Initializing],
    };

    startup.await_startup().await;
    tracing::debug!(connection_id = %connection_id, %slot, "Worker started");

    let (exit, stats) = worker.establish_and_relay(&ctx).await;
    let phases = worker.tear_down().await;

    metrics::record_worker_exit(exit.reason());
    tracing::info!(
        connection_id = %connection_id,
        %slot,
        reason = exit.reason(),
        steps = stats.steps,
        "Worker finished"
    );

    WorkerReport {
        connection_id,
        slot,
        exit,
        stats,
        phases,
    }
}

impl Worker {
    fn enter(&mut self, phase: WorkerPhase) {
        tracing::trace!(connection_id = %self.connection_id, ?phase, "Worker phase");
        self.phases.push(phase);
    }

    async fn establish_and_relay(&mut self, ctx: &WorkerContext) -> (WorkerExit, RelayStats) {
        let endpoint = Path::new(self.server_params.downstream_endpoint());
        let mut downstream = match connect_downstream(endpoint, ctx.connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(connection_id = %self.connection_id, error = %e, "Downstream connection failed");
                return (WorkerExit::DownstreamUnavailable, RelayStats::default());
            }
        };
        self.enter(WorkerPhase::Connected);

        let mut filter = match ctx.filters.initialize(self.connection_id).await {
            Ok(filter) => filter,
            Err(e) => {
                tracing::error!(connection_id = %self.connection_id, error = %e, "Filter initialization failed");
                self.downstream = Some(downstream);
                return (WorkerExit::FilterInitFailed, RelayStats::default());
            }
        };
        self.enter(WorkerPhase::Relaying);

        let (exit, stats) = run_relay(
            filter.as_mut(),
            &mut self.upstream,
            &mut downstream,
            &ctx.shutdown,
            ctx.idle_wait,
        )
        .await;

        self.downstream = Some(downstream);
        self.filter = Some(filter);
        (WorkerExit::Relay(exit), stats)
    }

    /// Release everything and give the slot back. Returns the phase history.
    async fn tear_down(mut self) -> Vec<WorkerPhase> {
        self.enter(WorkerPhase::TearingDown);

        if let Some(mut filter) = self.filter.take() {
            filter.finalize().await;
        }
        if let Some(downstream) = self.downstream.take() {
            drop(downstream);
        }
        let Worker {
            connection_id,
            slot,
            pool,
            upstream,
            mut phases,
            ..
        } = self;
        drop(upstream);

        if let Err(e) = pool.mark_joining(slot) {
            tracing::error!(connection_id = %connection_id, error = %e, "Failed to release worker slot");
        }

        phases.push(WorkerPhase::Done);
        phases
    }
}
