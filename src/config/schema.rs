//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the relay daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listening and downstream socket paths.
    pub endpoints: EndpointConfig,

    /// Worker pool sizing.
    pub pool: PoolConfig,

    /// Relay loop timing.
    pub relay: RelaySettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Build a config from the two endpoint paths, all else default.
    pub fn with_endpoints(listen: impl Into<String>, downstream: impl Into<String>) -> Self {
        Self {
            endpoints: EndpointConfig {
                listen: listen.into(),
                downstream: downstream.into(),
            },
            ..Self::default()
        }
    }
}

/// Endpoint configuration.
///
/// Both paths are required; an empty string means "not provided".
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointConfig {
    /// This entity's listening socket path.
    pub listen: String,

    /// The peer socket path every accepted connection is relayed to.
    pub downstream: String,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker slots (maximum concurrent connections).
    pub size: usize,

    /// How long shutdown waits for workers to finish, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 64,
            drain_timeout_secs: 10,
        }
    }
}

/// Relay loop timing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelaySettings {
    /// Pause between an idle step and the next one, in seconds.
    pub idle_wait_secs: u64,

    /// Bounded wait of a single pass-through step, in milliseconds.
    pub step_wait_ms: u64,

    /// Per-direction copy buffer size of the pass-through filter.
    pub buffer_size: usize,
}

impl RelaySettings {
    pub fn idle_wait(&self) -> Duration {
        Duration::from_secs(self.idle_wait_secs)
    }

    pub fn step_wait(&self) -> Duration {
        Duration::from_millis(self.step_wait_ms)
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            idle_wait_secs: 5,
            step_wait_ms: 1000,
            buffer_size: 8192,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Downstream connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_secs: 5 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Validated, immutable connection parameters.
///
/// Only obtainable through [`crate::config::validation::connection_params`],
/// so holding one means both endpoints are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    listen_endpoint: String,
    downstream_endpoint: String,
}

impl ConnectionParams {
    pub(crate) fn new(listen_endpoint: String, downstream_endpoint: String) -> Self {
        Self {
            listen_endpoint,
            downstream_endpoint,
        }
    }

    /// This entity's listening socket path.
    pub fn listen_endpoint(&self) -> &str {
        &self.listen_endpoint
    }

    /// The peer socket path to connect to for each connection.
    pub fn downstream_endpoint(&self) -> &str {
        &self.downstream_endpoint
    }
}
