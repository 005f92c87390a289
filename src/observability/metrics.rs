//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_connections_accepted_total` (counter): accepted upstream connections
//! - `relay_pool_exhausted_total` (counter): accepts that found no idle slot
//! - `relay_worker_exits_total` (counter): worker exits by reason
//! - `relay_active_workers` (gauge): slots currently Active or Joining
//! - `relay_slots_reaped_total` (counter): slots recycled to Idle
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection_accepted() {
    metrics::counter!("relay_connections_accepted_total").increment(1);
}

pub fn record_pool_exhausted() {
    metrics::counter!("relay_pool_exhausted_total").increment(1);
}

pub fn record_worker_exit(reason: &'static str) {
    metrics::counter!("relay_worker_exits_total", "reason" => reason).increment(1);
}

pub fn record_slots_reaped(count: usize) {
    metrics::counter!("relay_slots_reaped_total").increment(count as u64);
}

pub fn set_active_workers(count: usize) {
    metrics::gauge!("relay_active_workers").set(count as f64);
}
