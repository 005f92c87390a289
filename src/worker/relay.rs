//! Relay loop: repeated filter steps under the idle and error policy.
//!
//! # Policy
//! ```text
//! Progress → idle strikes reset, step again immediately
//! Idle     → one strike; second consecutive strike ends the loop,
//!            otherwise wait `idle_wait` (cut short by shutdown)
//! Error    → end the loop
//! Shutdown → checked before every step; an in-flight step completes
//! ```

use std::time::Duration;

use tokio::net::UnixStream;

use crate::filter::{Filter, StepOutcome};
use crate::lifecycle::Shutdown;

/// Consecutive idle steps after which a connection is considered abandoned.
pub const IDLE_STRIKE_LIMIT: u32 = 2;

/// Why the relay loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// Two consecutive idle steps.
    IdleTimeout,
    /// The filter reported an unrecoverable error.
    StepError,
    /// The process-wide running flag was cleared.
    Shutdown,
}

/// Step counters for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub steps: u64,
    pub progress: u64,
    pub idle: u64,
}

/// Drive `filter` between the two sockets until the policy says stop.
pub async fn run_relay(
    filter: &mut dyn Filter,
    upstream: &mut UnixStream,
    downstream: &mut UnixStream,
    shutdown: &Shutdown,
    idle_wait: Duration,
) -> (RelayExit, RelayStats) {
    let mut stats = RelayStats::default();
    let mut idle_strikes = 0;

    loop {
        if !shutdown.is_running() {
            return (RelayExit::Shutdown, stats);
        }

        let outcome = filter.step(upstream, downstream).await;
        stats.steps += 1;

        match outcome {
            StepOutcome::Progress => {
                stats.progress += 1;
                idle_strikes = 0;
            }
            StepOutcome::Idle => {
                stats.idle += 1;
                idle_strikes += 1;
                if idle_strikes >= IDLE_STRIKE_LIMIT {
                    return (RelayExit::IdleTimeout, stats);
                }
                tokio::select! {
                    _ = tokio::time::sleep(idle_wait) => {}
                    _ = shutdown.cancelled() => {}
                }
            }
            StepOutcome::Error => return (RelayExit::StepError, stats),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Replays a fixed list of outcomes, then reports Idle forever.
    struct Script(VecDeque<StepOutcome>);

    #[async_trait]
    impl Filter for Script {
        async fn step(&mut self, _: &mut UnixStream, _: &mut UnixStream) -> StepOutcome {
            self.0.pop_front().unwrap_or(StepOutcome::Idle)
        }

        async fn finalize(&mut self) {}
    }

    async fn relay(outcomes: &[StepOutcome], shutdown: &Shutdown) -> (RelayExit, RelayStats) {
        let (mut upstream, _a) = UnixStream::pair().unwrap();
        let (mut downstream, _b) = UnixStream::pair().unwrap();
        let mut filter = Script(outcomes.iter().copied().collect());
        run_relay(&mut filter, &mut upstream, &mut downstream, shutdown, Duration::from_millis(5)).await
    }

    use StepOutcome::{Error, Idle, Progress};

    #[tokio::test]
    async fn two_consecutive_idles_end_the_loop() {
        let (exit, stats) = relay(&[Progress, Progress, Progress, Idle, Idle, Progress], &Shutdown::new()).await;
        assert_eq!(exit, RelayExit::IdleTimeout);
        assert_eq!(stats, RelayStats { steps: 5, progress: 3, idle: 2 });
    }

    #[tokio::test]
    async fn progress_between_idles_resets_the_count() {
        let (exit, stats) = relay(&[Idle, Progress, Idle, Progress, Error], &Shutdown::new()).await;
        assert_eq!(exit, RelayExit::StepError);
        assert_eq!(stats.steps, 5);
        assert_eq!(stats.idle, 2);
    }

    #[tokio::test]
    async fn error_stops_immediately() {
        let (exit, stats) = relay(&[Error, Progress], &Shutdown::new()).await;
        assert_eq!(exit, RelayExit::StepError);
        assert_eq!(stats.steps, 1);
    }

    #[tokio::test]
    async fn shutdown_is_checked_before_stepping() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let (exit, stats) = relay(&[Progress], &shutdown).await;
        assert_eq!(exit, RelayExit::Shutdown);
        assert_eq!(stats.steps, 0);
    }

    #[tokio::test]
    async fn shutdown_cuts_the_idle_wait_short() {
        let shutdown = Shutdown::new();
        let (mut upstream, _a) = UnixStream::pair().unwrap();
        let (mut downstream, _b) = UnixStream::pair().unwrap();
        let mut filter = Script(VecDeque::from([Idle]));

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger();
        });

        let started = std::time::Instant::now();
        let (exit, _) = run_relay(
            &mut filter,
            &mut upstream,
            &mut downstream,
            &shutdown,
            Duration::from_secs(30),
        )
        .await;
        assert_eq!(exit, RelayExit::Shutdown);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
