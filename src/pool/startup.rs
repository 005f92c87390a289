//! One-shot startup rendezvous for a spawn cohort.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Barrier;

/// Barrier sized to the cohort's workers plus the spawning controller.
///
/// Each party calls [`StartupBarrier::await_startup`] exactly once. The
/// barrier is released once and never re-armed; a fresh one is created per
/// cohort.
#[derive(Debug)]
pub struct StartupBarrier {
    inner: Barrier,
    parties: usize,
    arrived: AtomicUsize,
}

impl StartupBarrier {
    /// A barrier for `workers` workers and one controller.
    pub fn new(workers: usize) -> Self {
        let parties = workers + 1;
        Self {
            inner: Barrier::new(parties),
            parties,
            arrived: AtomicUsize::new(0),
        }
    }

    /// Total number of parties (workers + controller).
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Whether every party has already arrived.
    pub fn is_released(&self) -> bool {
        self.arrived.load(Ordering::Acquire) >= self.parties
    }

    /// Wait until every party of the cohort has arrived.
    ///
    /// An extra call after release returns immediately instead of blocking
    /// on a second generation that nobody else will join.
    pub async fn await_startup(&self) {
        let arrival = self.arrived.fetch_add(1, Ordering::AcqRel) + 1;
        if arrival > self.parties {
            tracing::warn!(parties = self.parties, arrival, "Startup barrier already released");
            return;
        }
        self.inner.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn releases_when_all_parties_arrive() {
        let barrier = Arc::new(StartupBarrier::new(2));
        assert_eq!(barrier.parties(), 3);

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let barrier = barrier.clone();
                tokio::spawn(async move { barrier.await_startup().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(workers.iter().all(|w| !w.is_finished()));
        assert!(!barrier.is_released());

        barrier.await_startup().await;
        for worker in workers {
            worker.await.unwrap();
        }
        assert!(barrier.is_released());
    }

    #[tokio::test]
    async fn late_caller_does_not_block() {
        let barrier = StartupBarrier::new(0);
        barrier.await_startup().await;
        tokio::time::timeout(Duration::from_secs(1), barrier.await_startup())
            .await
            .unwrap();
    }
}
