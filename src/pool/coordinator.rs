//! Worker slot table.
//!
//! # Responsibilities
//! - Allocate slots for new connections (synchronous with spawn)
//! - Hold each worker's join handle until it is reaped
//! - Record worker exit (Active → Joining) and wake the controller
//! - Reap finished workers and recycle their slots
//! - Drain the whole pool on shutdown
//!
//! # Design Decisions
//! - One lock over the whole table, never held across an `.await`
//! - Join handles are awaited outside the lock
//! - Every transition is published on a broadcast channel while the lock is held,
//!   so subscribers see per-slot transitions in order

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::pool::slot::{SlotId, SlotState, SlotTransition};
use crate::pool::startup::StartupBarrier;

/// Capacity of the transition feed; slow subscribers see `Lagged`.
const TRANSITION_FEED_CAPACITY: usize = 1024;

/// Poll interval while draining, in case a worker dies without marking its slot.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors reported by the slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// No idle slot; the caller must not spawn a worker.
    #[error("worker pool exhausted")]
    Exhausted,

    #[error("{0} does not exist")]
    UnknownSlot(SlotId),

    /// Attempted a transition outside Idle → Active → Joining → Idle.
    #[error("{slot}: illegal transition {from:?} → {to:?}")]
    InvalidTransition {
        slot: SlotId,
        from: SlotState,
        to: SlotState,
    },

    /// A join handle was attached twice, or to a slot with no worker.
    #[error("{0}: cannot attach a worker handle")]
    AttachRejected(SlotId),
}

/// Outcome of [`PoolCoordinator::drain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainResult {
    Complete,
    Timeout { remaining: usize },
}

#[derive(Debug)]
struct Slot {
    state: SlotState,
    handle: Option<JoinHandle<()>>,
}

impl Slot {
    fn idle() -> Self {
        Self {
            state: SlotState::Idle,
            handle: None,
        }
    }
}

/// Fixed-size table of worker slots shared by the controller and all workers.
#[derive(Debug)]
pub struct PoolCoordinator {
    slots: Mutex<Vec<Slot>>,
    joining: Notify,
    transitions: broadcast::Sender<SlotTransition>,
}

impl PoolCoordinator {
    /// Create a table of `capacity` idle slots. The table is never resized.
    pub fn new(capacity: usize) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_FEED_CAPACITY);
        Self {
            slots: Mutex::new((0..capacity).map(|_| Slot::idle()).collect()),
            joining: Notify::new(),
            transitions,
        }
    }

    /// Convenience constructor returning a shareable handle.
    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    /// Find an idle slot, mark it Active and return it.
    pub fn allocate_slot(&self) -> Result<SlotId, PoolError> {
        let mut slots = self.slots.lock();
        let index = slots
            .iter()
            .position(|slot| slot.state == SlotState::Idle)
            .ok_or(PoolError::Exhausted)?;

        let id = SlotId(index);
        self.set_state(&mut slots, id, SlotState::Active)?;
        Ok(id)
    }

    /// Record the join handle of the worker spawned for `slot`.
    pub fn attach(&self, slot: SlotId, handle: JoinHandle<()>) -> Result<(), PoolError> {
        let mut slots = self.slots.lock();
        let entry = slots.get_mut(slot.0).ok_or(PoolError::UnknownSlot(slot))?;
        if entry.state == SlotState::Idle || entry.handle.is_some() {
            return Err(PoolError::AttachRejected(slot));
        }
        entry.handle = Some(handle);
        Ok(())
    }

    /// Called once by a worker at the very end of its teardown.
    pub fn mark_joining(&self, slot: SlotId) -> Result<(), PoolError> {
        {
            let mut slots = self.slots.lock();
            self.set_state(&mut slots, slot, SlotState::Joining)?;
        }
        self.joining.notify_one();
        Ok(())
    }

    /// Wait until some worker has marked its slot joining.
    ///
    /// A notification raised while nobody is waiting is kept, so a worker
    /// finishing between two calls is never missed.
    pub async fn joining(&self) {
        self.joining.notified().await;
    }

    /// Join every finished worker and return its slot to Idle.
    ///
    /// Returns the number of slots recycled.
    pub async fn reap(&self) -> usize {
        let finished: Vec<(SlotId, JoinHandle<()>)> = {
            let mut slots = self.slots.lock();
            self.adopt_crashed(&mut slots);
            slots
                .iter_mut()
                .enumerate()
                .filter(|(_, slot)| slot.state == SlotState::Joining)
                .filter_map(|(index, slot)| slot.handle.take().map(|handle| (SlotId(index), handle)))
                .collect()
        };

        let mut reaped = 0;
        for (slot, handle) in finished {
            if let Err(e) = handle.await {
                tracing::error!(%slot, error = %e, "Worker terminated abnormally");
            }

            let mut slots = self.slots.lock();
            match self.set_state(&mut slots, slot, SlotState::Idle) {
                Ok(()) => reaped += 1,
                Err(e) => tracing::error!(error = %e, "Failed to recycle slot"),
            }
        }

        if reaped > 0 {
            metrics::record_slots_reaped(reaped);
            tracing::debug!(reaped, "Reaped worker slots");
        }
        reaped
    }

    /// Reap until every slot is idle or `timeout` elapses.
    pub async fn drain(&self, timeout: Duration) -> DrainResult {
        let deadline = Instant::now() + timeout;

        loop {
            self.reap().await;
            let busy = self.busy_count();
            if busy == 0 {
                return DrainResult::Complete;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return DrainResult::Timeout { remaining: busy };
            }

            tokio::select! {
                _ = self.joining() => {}
                _ = tokio::time::sleep(remaining.min(DRAIN_POLL_INTERVAL)) => {}
            }
        }
    }

    /// Guard to be held by the task running the worker for `slot`.
    pub fn exit_guard(self: &Arc<Self>, slot: SlotId) -> SlotGuard {
        SlotGuard {
            pool: self.clone(),
            slot,
        }
    }

    /// Create the startup barrier for a cohort of `workers` simultaneous spawns.
    pub fn startup_cohort(&self, workers: usize) -> Arc<StartupBarrier> {
        Arc::new(StartupBarrier::new(workers))
    }

    pub fn state(&self, slot: SlotId) -> Option<SlotState> {
        self.slots.lock().get(slot.0).map(|s| s.state)
    }

    /// States of all slots, in slot order.
    pub fn snapshot(&self) -> Vec<SlotState> {
        self.slots.lock().iter().map(|s| s.state).collect()
    }

    /// Slots that are Active or Joining.
    pub fn busy_count(&self) -> usize {
        busy(&self.slots.lock())
    }

    pub fn idle_count(&self) -> usize {
        self.capacity() - self.busy_count()
    }

    /// Receive every subsequent slot transition.
    pub fn subscribe(&self) -> broadcast::Receiver<SlotTransition> {
        self.transitions.subscribe()
    }

    /// A worker whose task ended without marking its slot (it panicked)
    /// is moved to Joining so the normal reap path recycles it.
    fn adopt_crashed(&self, slots: &mut [Slot]) {
        let crashed: Vec<SlotId> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                slot.state == SlotState::Active
                    && slot.handle.as_ref().is_some_and(JoinHandle::is_finished)
            })
            .map(|(index, _)| SlotId(index))
            .collect();

        for slot in crashed {
            tracing::warn!(%slot, "Worker ended without releasing its slot");
            if let Err(e) = self.set_state(slots, slot, SlotState::Joining) {
                tracing::error!(error = %e, "Failed to adopt crashed worker slot");
            }
        }
    }

    /// Move a slot whose worker task is gone, but never marked it, to Joining
    /// and wake the controller.
    fn release_abandoned(&self, slot: SlotId) -> bool {
        let released = {
            let mut slots = self.slots.lock();
            if slots.get(slot.0).map(|s| s.state) != Some(SlotState::Active) {
                return false;
            }
            tracing::warn!(%slot, "Worker task ended without releasing its slot");
            match self.set_state(&mut slots, slot, SlotState::Joining) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to release abandoned slot");
                    false
                }
            }
        };
        if released {
            self.joining.notify_one();
        }
        released
    }

    /// The only place a slot's state is written. Caller holds the lock.
    fn set_state(&self, slots: &mut [Slot], slot: SlotId, to: SlotState) -> Result<(), PoolError> {
        let entry = slots.get_mut(slot.0).ok_or(PoolError::UnknownSlot(slot))?;
        let from = entry.state;
        if !from.can_transition_to(to) {
            return Err(PoolError::InvalidTransition { slot, from, to });
        }
        entry.state = to;

        tracing::trace!(%slot, ?from, ?to, "Slot transition");
        // No subscribers is fine.
        let _ = self.transitions.send(SlotTransition { slot, from, to });
        metrics::set_active_workers(busy(slots));
        Ok(())
    }
}

/// Releases the slot when a worker task ends without `mark_joining`.
///
/// The task's future is dropped before its join handle resolves, so the slot
/// cannot have been reaped and handed to another worker when this runs.
#[derive(Debug)]
pub struct SlotGuard {
    pool: Arc<PoolCoordinator>,
    slot: SlotId,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.pool.release_abandoned(self.slot);
    }
}

fn busy(slots: &[Slot]) -> usize {
    slots.iter().filter(|s| s.state != SlotState::Idle).count()
}
