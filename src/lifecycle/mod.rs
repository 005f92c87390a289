//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Flag flips → accept loop stops → workers notice at next relay step
//!     → controller drains the pool with a deadline → exit
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative; a worker is never aborted mid-step
//! - Shutdown has timeout: workers still running after the drain deadline are reported

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
