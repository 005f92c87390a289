//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! Controller:
//!     allocate_slot (Idle → Active) → spawn worker → attach handle
//!     → await_startup (cohort barrier)
//!
//! Worker:
//!     await_startup → ... relay ... → teardown → mark_joining (Active → Joining)
//!
//! Controller (on joining notification):
//!     reap → await handle outside the lock → Joining → Idle
//! ```
//!
//! # Design Decisions
//! - Allocation is synchronous with spawn, reaping is deferred
//! - Exhaustion is reported to the caller, which owns the backpressure policy
//! - Each worker task holds a `SlotGuard`, so a panicking worker still frees
//!   its slot and wakes the controller

pub mod coordinator;
pub mod slot;
pub mod startup;

pub use coordinator::{DrainResult, PoolCoordinator, PoolError, SlotGuard};
pub use slot::{SlotId, SlotState, SlotTransition};
pub use startup::StartupBarrier;
