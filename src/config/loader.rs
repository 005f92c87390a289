//! Configuration loading from disk and the command line.

use std::fs;
use std::path::Path;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Values given on the command line. `None` keeps the file's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<String>,
    pub downstream: Option<String>,
    pub pool_size: Option<usize>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    /// Apply every present override on top of `config`.
    pub fn apply(&self, config: &mut RelayConfig) {
        if let Some(listen) = &self.listen {
            config.endpoints.listen = listen.clone();
        }
        if let Some(downstream) = &self.downstream {
            config.endpoints.downstream = downstream.clone();
        }
        if let Some(size) = self.pool_size {
            config.pool.size = size;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

/// Parse a configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build the effective configuration: optional file, then CLI overrides, then validation.
pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            parse_config(&content)?
        }
        None => RelayConfig::default(),
    };

    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [endpoints]
        listen = "/tmp/relay-in.sock"
        downstream = "/tmp/relay-out.sock"

        [pool]
        size = 4

        [relay]
        idle_wait_secs = 2
    "#;

    #[test]
    fn parses_partial_file_with_defaults() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.endpoints.listen, "/tmp/relay-in.sock");
        assert_eq!(config.pool.size, 4);
        assert_eq!(config.pool.drain_timeout_secs, 10);
        assert_eq!(config.relay.idle_wait_secs, 2);
        assert_eq!(config.relay.step_wait_ms, 1000);
        assert_eq!(config.timeouts.connect_secs, 5);
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn load_config_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pool]\nsize = 2").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn load_config_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pool\nsize = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let overrides = ConfigOverrides {
            downstream: Some("/tmp/other.sock".into()),
            pool_size: Some(9),
            ..ConfigOverrides::default()
        };
        let config = resolve_config(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.endpoints.listen, "/tmp/relay-in.sock");
        assert_eq!(config.endpoints.downstream, "/tmp/other.sock");
        assert_eq!(config.pool.size, 9);
    }

    #[test]
    fn cli_only_configuration() {
        let overrides = ConfigOverrides {
            listen: Some("/tmp/a.sock".into()),
            downstream: Some("/tmp/b.sock".into()),
            ..ConfigOverrides::default()
        };
        let config = resolve_config(None, &overrides).unwrap();
        assert_eq!(config.endpoints.downstream, "/tmp/b.sock");

        let missing = ConfigOverrides {
            listen: Some("/tmp/a.sock".into()),
            ..ConfigOverrides::default()
        };
        assert!(matches!(
            resolve_config(None, &missing),
            Err(ConfigError::Validation(errors)) if errors == vec![ValidationError::MissingDownstreamEndpoint]
        ));
    }
}
