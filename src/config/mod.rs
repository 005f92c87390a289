//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI overrides (positional endpoints, --pool-size, --log-level)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → ConnectionParams shared via Arc to every worker
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults except the two endpoints
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError, ConfigOverrides};
pub use schema::{
    ConnectionParams, EndpointConfig, ObservabilityConfig, PoolConfig, RelayConfig, RelaySettings,
    TimeoutConfig,
};
pub use validation::{connection_params, validate_config, ValidationError};
