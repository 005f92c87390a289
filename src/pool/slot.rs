//! Slot identity and lifecycle states.
//!
//! # State Transitions
//! ```text
//! Idle → Active:     allocate_slot (controller, before spawning)
//! Active → Joining:  mark_joining (worker, last step of teardown)
//! Joining → Idle:    reap (coordinator, after the worker task has ended)
//! ```

use std::fmt;

/// Index into the coordinator's slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// Lifecycle state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// Free for a new connection.
    Idle,
    /// A worker has been (or is about to be) spawned for it.
    Active,
    /// The worker finished teardown and waits to be reaped.
    Joining,
}

impl SlotState {
    /// Whether `self → next` is one of the three legal transitions.
    pub fn can_transition_to(self, next: SlotState) -> bool {
        matches!(
            (self, next),
            (SlotState::Idle, SlotState::Active)
                | (SlotState::Active, SlotState::Joining)
                | (SlotState::Joining, SlotState::Idle)
        )
    }
}

/// A slot state change, as published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTransition {
    pub slot: SlotId,
    pub from: SlotState,
    pub to: SlotState,
}
