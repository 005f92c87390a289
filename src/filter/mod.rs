//! Per-connection filter interface.
//!
//! # Data Flow
//! ```text
//! FilterFactory::initialize (once per worker, after downstream connect)
//!     → Filter::step (repeated by the relay loop, bounded internal wait)
//!         → Progress | Idle | Error
//!     → Filter::finalize (exactly once, also after Error)
//! ```
//!
//! # Design Decisions
//! - The relay core never looks inside the protocol; it only reacts to the
//!   step outcome
//! - Filters log their own step failures, the worker logs only the exit reason
//! - A filter instance is owned by exactly one worker

pub mod passthrough;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UnixStream;

use crate::net::ConnectionId;

pub use passthrough::{PassthroughFactory, PassthroughFilter};

/// Result of a single filter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Data was relayed or transformed.
    Progress,
    /// Nothing arrived within the step's internal wait.
    Idle,
    /// Unrecoverable: protocol violation, socket error, or peer closed.
    Error,
}

/// Filter initialization failure.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("filter resources unavailable: {0}")]
    Resource(String),

    #[error("filter I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transformation state for one connection.
#[async_trait]
pub trait Filter: Send {
    /// Move (and possibly transform) one unit of traffic between the peers.
    async fn step(&mut self, upstream: &mut UnixStream, downstream: &mut UnixStream) -> StepOutcome;

    /// Release everything the filter owns. Safe to call after an `Error` step.
    async fn finalize(&mut self);
}

/// Creates one [`Filter`] per connection.
#[async_trait]
pub trait FilterFactory: Send + Sync + 'static {
    async fn initialize(&self, connection: ConnectionId) -> Result<Box<dyn Filter>, FilterError>;
}
