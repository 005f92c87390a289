//! Relay server: the controller side of the worker pool.
//!
//! # Responsibilities
//! - Validate configuration before anything is spawned
//! - Accept connections and allocate a slot for each
//! - Hold a connection while the pool is exhausted until a slot is reaped
//! - Spawn workers in cohorts behind a startup barrier
//! - Reap finished workers as they report joining
//! - Stop accepting on shutdown and drain the pool with a deadline

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UnixStream;

use crate::config::{connection_params, ConfigError, ConnectionParams, RelayConfig};
use crate::filter::{FilterFactory, PassthroughFactory};
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionId, Listener, ListenerError};
use crate::observability::metrics;
use crate::pool::{DrainResult, PoolCoordinator, PoolError, SlotId};
use crate::worker::{run_worker, WorkerContext, WorkerParams};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Startup failures of the relay server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),
}

/// A connection accepted and assigned a slot, waiting to be spawned.
pub type PendingConnection = (UnixStream, ConnectionId, SlotId);

/// The relay daemon's controller.
pub struct RelayServer {
    config: RelayConfig,
    params: Arc<ConnectionParams>,
    pool: Arc<PoolCoordinator>,
    filters: Arc<dyn FilterFactory>,
}

impl RelayServer {
    /// Validate `config` and build the pool. Fails without spawning anything
    /// if either endpoint is missing.
    pub fn new(config: RelayConfig, filters: Arc<dyn FilterFactory>) -> Result<Self, ServerError> {
        let params = connection_params(&config).map_err(ConfigError::Validation)?;
        let pool = PoolCoordinator::shared(config.pool.size);

        Ok(Self {
            config,
            params: Arc::new(params),
            pool,
            filters,
        })
    }

    /// Server using the transparent pass-through filter.
    pub fn with_passthrough(config: RelayConfig) -> Result<Self, ServerError> {
        let filters = Arc::new(PassthroughFactory::from_settings(&config.relay));
        Self::new(config, filters)
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn pool(&self) -> Arc<PoolCoordinator> {
        self.pool.clone()
    }

    /// Bind the configured listen endpoint.
    pub fn bind(&self) -> Result<Listener, ServerError> {
        Ok(Listener::bind(self.params.listen_endpoint())?)
    }

    /// Accept and relay until `shutdown` fires, then drain the pool.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> DrainResult {
        let ctx = WorkerContext::new(self.filters.clone(), shutdown.clone(), &self.config);

        tracing::info!(
            listen = %listener.path().display(),
            downstream = %self.params.downstream_endpoint(),
            pool_size = self.pool.capacity(),
            "Relay server starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.pool.joining() => {
                    self.pool.reap().await;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, connection_id)) => {
                            metrics::record_connection_accepted();
                            match self.acquire_slot(&shutdown).await {
                                Ok(Some(slot)) => {
                                    self.spawn_cohort(&ctx, vec![(stream, connection_id, slot)]).await;
                                }
                                Ok(None) => {
                                    tracing::debug!(connection_id = %connection_id, "Dropping connection during shutdown");
                                    break;
                                }
                                Err(e) => {
                                    tracing::error!(connection_id = %connection_id, error = %e, "Slot allocation failed, dropping connection");
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        drop(listener);
        tracing::info!(busy = self.pool.busy_count(), "Stopped accepting, draining workers");

        let result = self
            .pool
            .drain(Duration::from_secs(self.config.pool.drain_timeout_secs))
            .await;
        match &result {
            DrainResult::Complete => tracing::info!("All workers finished"),
            DrainResult::Timeout { remaining } => {
                tracing::warn!(remaining, "Drain deadline passed with workers still running")
            }
        }
        result
    }

    /// Allocate a slot, reaping first and waiting while the pool is exhausted.
    ///
    /// Returns `Ok(None)` if shutdown fires while waiting, and any allocation
    /// error other than exhaustion.
    pub async fn acquire_slot(&self, shutdown: &Shutdown) -> Result<Option<SlotId>, PoolError> {
        loop {
            self.pool.reap().await;
            match self.pool.allocate_slot() {
                Ok(slot) => return Ok(Some(slot)),
                Err(PoolError::Exhausted) => {
                    metrics::record_pool_exhausted();
                    tracing::warn!(
                        capacity = self.pool.capacity(),
                        "Worker pool exhausted, holding connection until a slot frees up"
                    );
                    tokio::select! {
                        _ = self.pool.joining() => {}
                        _ = shutdown.cancelled() => return Ok(None),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Spawn one worker per pending connection and meet them at the startup barrier.
    ///
    /// Every slot in `batch` must have been allocated by [`Self::acquire_slot`].
    /// Returns once all workers hold their own parameters.
    pub async fn spawn_cohort(&self, ctx: &WorkerContext, batch: Vec<PendingConnection>) {
        let startup = self.pool.startup_cohort(batch.len());

        for (upstream, connection_id, slot) in batch {
            let params = WorkerParams {
                connection_id,
                upstream,
                slot,
                server_params: self.params.clone(),
                pool: self.pool.clone(),
                startup: startup.clone(),
            };
            let worker_ctx = ctx.clone();
            let guard = self.pool.exit_guard(slot);
            let handle = tokio::spawn(async move {
                let _guard = guard;
                run_worker(params, worker_ctx).await;
            });

            if let Err(e) = self.pool.attach(slot, handle) {
                tracing::error!(connection_id = %connection_id, error = %e, "Failed to track worker");
            }
        }

        startup.await_startup().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(dir: &std::path::Path, pool_size: usize) -> RelayServer {
        let mut config = RelayConfig::with_endpoints(
            dir.join("relay.sock").display().to_string(),
            dir.join("peer.sock").display().to_string(),
        );
        config.pool.size = pool_size;
        RelayServer::with_passthrough(config).unwrap()
    }

    #[tokio::test]
    async fn acquire_slot_reports_shutdown_separately() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path(), 1);
        let shutdown = Shutdown::new();

        let slot = server.acquire_slot(&shutdown).await.unwrap();
        assert_eq!(slot, Some(SlotId(0)));

        shutdown.trigger();
        assert_eq!(server.acquire_slot(&shutdown).await, Ok(None));
    }
}
