//! Unix Socket Relay Library
//!
//! Accepts connections on a local socket, relays each one through a
//! per-connection filter to a fixed downstream socket, and manages the
//! bounded pool of workers doing so.

pub mod config;
pub mod filter;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pool;
pub mod server;
pub mod worker;

pub use config::RelayConfig;
pub use lifecycle::Shutdown;
pub use server::RelayServer;
