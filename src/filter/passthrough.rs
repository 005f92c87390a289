//! Transparent filter: forwards bytes unchanged in both directions.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::config::RelaySettings;
use crate::filter::{Filter, FilterError, FilterFactory, StepOutcome};
use crate::net::ConnectionId;

#[derive(Debug, Clone, Copy)]
enum Direction {
    Upstream,
    Downstream,
}

/// Builds [`PassthroughFilter`]s with a fixed wait and buffer size.
#[derive(Debug, Clone)]
pub struct PassthroughFactory {
    step_wait: Duration,
    buffer_size: usize,
}

impl PassthroughFactory {
    pub fn new(step_wait: Duration, buffer_size: usize) -> Self {
        Self {
            step_wait,
            buffer_size,
        }
    }

    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self::new(settings.step_wait(), settings.buffer_size)
    }
}

#[async_trait]
impl FilterFactory for PassthroughFactory {
    async fn initialize(&self, connection: ConnectionId) -> Result<Box<dyn Filter>, FilterError> {
        if self.buffer_size == 0 {
            return Err(FilterError::Resource("zero-sized relay buffer".into()));
        }
        Ok(Box::new(PassthroughFilter {
            connection,
            step_wait: self.step_wait,
            upstream_buf: vec![0; self.buffer_size],
            downstream_buf: vec![0; self.buffer_size],
            bytes_up: 0,
            bytes_down: 0,
        }))
    }
}

/// Copies whichever side becomes readable first to the other side.
pub struct PassthroughFilter {
    connection: ConnectionId,
    step_wait: Duration,
    upstream_buf: Vec<u8>,
    downstream_buf: Vec<u8>,
    /// Bytes forwarded upstream → downstream.
    bytes_up: u64,
    /// Bytes forwarded downstream → upstream.
    bytes_down: u64,
}

#[async_trait]
impl Filter for PassthroughFilter {
    async fn step(&mut self, upstream: &mut UnixStream, downstream: &mut UnixStream) -> StepOutcome {
        let (direction, result) = tokio::select! {
            r = upstream.read(&mut self.upstream_buf) => (Direction::Upstream, r),
            r = downstream.read(&mut self.downstream_buf) => (Direction::Downstream, r),
            _ = tokio::time::sleep(self.step_wait) => return StepOutcome::Idle,
        };

        let n = match result {
            Ok(0) => {
                tracing::debug!(connection_id = %self.connection, ?direction, "Peer closed");
                return StepOutcome::Error;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(connection_id = %self.connection, ?direction, error = %e, "Read failed");
                return StepOutcome::Error;
            }
        };

        let written = match direction {
            Direction::Upstream => downstream.write_all(&self.upstream_buf[..n]).await,
            Direction::Downstream => upstream.write_all(&self.downstream_buf[..n]).await,
        };

        if let Err(e) = written {
            tracing::warn!(connection_id = %self.connection, ?direction, error = %e, "Write failed");
            return StepOutcome::Error;
        }

        match direction {
            Direction::Upstream => self.bytes_up += n as u64,
            Direction::Downstream => self.bytes_down += n as u64,
        }
        StepOutcome::Progress
    }

    async fn finalize(&mut self) {
        tracing::debug!(
            connection_id = %self.connection,
            bytes_up = self.bytes_up,
            bytes_down = self.bytes_down,
            "Filter finalized"
        );
        self.upstream_buf = Vec::new();
        self.downstream_buf = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn filter(wait_ms: u64) -> Box<dyn Filter> {
        PassthroughFactory::new(Duration::from_millis(wait_ms), 64)
            .initialize(ConnectionId::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn forwards_in_both_directions() {
        let (mut client, mut upstream) = UnixStream::pair().unwrap();
        let (mut downstream, mut peer) = UnixStream::pair().unwrap();
        let mut filter = filter(500).await;

        client.write_all(b"ping").await.unwrap();
        assert_eq!(filter.step(&mut upstream, &mut downstream).await, StepOutcome::Progress);
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        peer.write_all(b"pong").await.unwrap();
        assert_eq!(filter.step(&mut upstream, &mut downstream).await, StepOutcome::Progress);
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        filter.finalize().await;
    }

    #[tokio::test]
    async fn quiet_connection_is_idle() {
        let (_client, mut upstream) = UnixStream::pair().unwrap();
        let (mut downstream, _peer) = UnixStream::pair().unwrap();
        let mut filter = filter(20).await;

        assert_eq!(filter.step(&mut upstream, &mut downstream).await, StepOutcome::Idle);
    }

    #[tokio::test]
    async fn closed_peer_is_an_error() {
        let (client, mut upstream) = UnixStream::pair().unwrap();
        let (mut downstream, _peer) = UnixStream::pair().unwrap();
        let mut filter = filter(500).await;

        drop(client);
        assert_eq!(filter.step(&mut upstream, &mut downstream).await, StepOutcome::Error);
        filter.finalize().await;
    }

    #[tokio::test]
    async fn zero_buffer_fails_initialization() {
        let factory = PassthroughFactory::new(Duration::from_millis(10), 0);
        assert!(factory.initialize(ConnectionId::new()).await.is_err());
    }
}
