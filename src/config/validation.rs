//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require both endpoints before anything is spawned
//! - Validate value ranges (pool size, buffer size, step wait > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{ConnectionParams, RelayConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// This entity's socket name was not given.
    MissingListenEndpoint,
    /// The destination's socket name was not given.
    MissingDownstreamEndpoint,
    /// Pool must hold at least one worker.
    ZeroPoolSize,
    /// Pass-through step wait must be positive.
    ZeroStepWait,
    /// Relay buffer must be positive.
    ZeroBufferSize,
    /// Log format is neither "pretty" nor "json".
    UnknownLogFormat(String),
    /// Metrics enabled with an unparsable address.
    InvalidMetricsAddress(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingListenEndpoint => {
                write!(f, "Missing parameter: this entity's socket name")
            }
            ValidationError::MissingDownstreamEndpoint => {
                write!(f, "Missing parameter: the destination's socket name")
            }
            ValidationError::ZeroPoolSize => write!(f, "pool.size must be at least 1"),
            ValidationError::ZeroStepWait => write!(f, "relay.step_wait_ms must be at least 1"),
            ValidationError::ZeroBufferSize => write!(f, "relay.buffer_size must be at least 1"),
            ValidationError::UnknownLogFormat(format) => {
                write!(f, "Unknown log format '{}' (expected pretty or json)", format)
            }
            ValidationError::InvalidMetricsAddress(addr) => {
                write!(f, "Invalid metrics address '{}'", addr)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.listen.trim().is_empty() {
        errors.push(ValidationError::MissingListenEndpoint);
    }
    if config.endpoints.downstream.trim().is_empty() {
        errors.push(ValidationError::MissingDownstreamEndpoint);
    }
    if config.pool.size == 0 {
        errors.push(ValidationError::ZeroPoolSize);
    }
    if config.relay.step_wait_ms == 0 {
        errors.push(ValidationError::ZeroStepWait);
    }
    if config.relay.buffer_size == 0 {
        errors.push(ValidationError::ZeroBufferSize);
    }
    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::UnknownLogFormat(other.to_string())),
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Extract the immutable connection parameters from a validated config.
pub fn connection_params(config: &RelayConfig) -> Result<ConnectionParams, Vec<ValidationError>> {
    validate_config(config)?;
    Ok(ConnectionParams::new(
        config.endpoints.listen.clone(),
        config.endpoints.downstream.clone(),
    ))
}
