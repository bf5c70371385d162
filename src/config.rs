//! Configuration management for Mayfly Forms.
//!
//! Only the host concerns are configurable. The limiter's windows are fixed
//! constants owned by [`crate::ratelimit::WindowSpec::standard`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{MayflyError, Result};

/// Prefix for environment overrides, e.g. `MAYFLY__LOGGING__LEVEL=debug`.
const ENV_PREFIX: &str = "MAYFLY";

/// Main configuration for the Mayfly Forms service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MayflyConfig {
    /// Rate limiter housekeeping configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rate limiter housekeeping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// How often idle clients are swept, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Entries older than this are dropped by the sweep, in seconds
    #[serde(default = "default_cleanup_max_age")]
    pub cleanup_max_age_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: default_cleanup_interval(),
            cleanup_max_age_secs: default_cleanup_max_age(),
        }
    }
}

impl RateLimitingConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn cleanup_max_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_max_age_secs)
    }
}

fn default_cleanup_interval() -> u64 {
    3600
}

fn default_cleanup_max_age() -> u64 {
    86400
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl MayflyConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: MayflyConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file, then apply `MAYFLY__*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            if !path.exists() {
                return Err(MayflyError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let config: MayflyConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rate_limiting.cleanup_interval_secs == 0 {
            return Err(MayflyError::Config(
                "cleanup_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
