//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use socket_relay::filter::{Filter, FilterError, FilterFactory, StepOutcome};
use socket_relay::net::ConnectionId;

/// Counts filter lifecycle calls across all instances of a factory.
#[derive(Debug, Default)]
pub struct FilterCounters {
    pub initialized: AtomicUsize,
    pub finalized: AtomicUsize,
    pub steps: AtomicUsize,
}

impl FilterCounters {
    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn finalized(&self) -> usize {
        self.finalized.load(Ordering::SeqCst)
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}

/// Factory whose filters replay a fixed list of outcomes, then report Idle.
pub struct ScriptedFactory {
    script: Vec<StepOutcome>,
    fail_init: bool,
    /// Delay before each step returns, standing in for the step's internal wait.
    step_delay: Duration,
    pub counters: Arc<FilterCounters>,
}

impl ScriptedFactory {
    pub fn new(script: &[StepOutcome]) -> Self {
        Self {
            script: script.to_vec(),
            fail_init: false,
            step_delay: Duration::ZERO,
            counters: Arc::new(FilterCounters::default()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::new(&[])
        }
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

#[async_trait]
impl FilterFactory for ScriptedFactory {
    async fn initialize(&self, _connection: ConnectionId) -> Result<Box<dyn Filter>, FilterError> {
        if self.fail_init {
            return Err(FilterError::Resource("scripted failure".into()));
        }
        self.counters.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedFilter {
            script: self.script.iter().copied().collect(),
            step_delay: self.step_delay,
            counters: self.counters.clone(),
            finalized: false,
        }))
    }
}

struct ScriptedFilter {
    script: VecDeque<StepOutcome>,
    step_delay: Duration,
    counters: Arc<FilterCounters>,
    finalized: bool,
}

#[async_trait]
impl Filter for ScriptedFilter {
    async fn step(&mut self, _upstream: &mut UnixStream, _downstream: &mut UnixStream) -> StepOutcome {
        assert!(!self.finalized, "step after finalize");
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
        self.counters.steps.fetch_add(1, Ordering::SeqCst);
        self.script.pop_front().unwrap_or(StepOutcome::Idle)
    }

    async fn finalize(&mut self) {
        assert!(!self.finalized, "finalized twice");
        self.finalized = true;
        self.counters.finalized.fetch_add(1, Ordering::SeqCst);
    }
}

/// A downstream peer that records every connection it accepts.
pub struct Peer {
    pub accepted: Arc<Mutex<Vec<UnixStream>>>,
}

impl Peer {
    pub fn start(path: &Path) -> Self {
        let listener = UnixListener::bind(path).unwrap();
        let accepted = Arc::new(Mutex::new(Vec::new()));
        let sink = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                sink.lock().push(stream);
            }
        });
        Self { accepted }
    }

    pub fn take(&self) -> Vec<UnixStream> {
        std::mem::take(&mut *self.accepted.lock())
    }
}

/// Start an echo server at `path`.
pub fn start_echo_peer(path: &Path) {
    let listener = UnixListener::bind(path).unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
}

/// True once the other end of `stream` has been closed.
pub async fn is_closed(stream: &mut UnixStream) -> bool {
    let mut buf = [0u8; 16];
    matches!(
        tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await,
        Ok(Ok(0)) | Ok(Err(_))
    )
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
