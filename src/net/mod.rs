//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Unix socket connection
//!     → listener.rs (bind, accept, connection id)
//!     → hand off to the relay server / worker pool
//!     → downstream.rs (worker opens its peer connection)
//! ```
//!
//! # Design Decisions
//! - Both sides are Unix domain stream sockets
//! - Connect has a deadline; a missing peer fails fast with the system error

pub mod connection;
pub mod downstream;
pub mod listener;

pub use connection::ConnectionId;
pub use downstream::{connect_downstream, ConnectError};
pub use listener::{Listener, ListenerError};
