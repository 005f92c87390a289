//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Controller, pool and workers produce:
//!     → logging.rs (structured log events, connection id on every worker event)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
