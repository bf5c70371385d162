//! Error types for the Mayfly Forms service.

use thiserror::Error;

/// Main error type for Mayfly Forms operations.
///
/// The rate limiter itself never fails; these cover the layers around it.
#[derive(Error, Debug)]
pub enum MayflyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised while layering configuration sources
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// YAML parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON encode/decode errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request carried no usable client address
    #[error("Unable to resolve client address")]
    UnresolvableClient,

    /// A window set that cannot be enforced
    #[error("Invalid rate limit windows: {0}")]
    InvalidWindows(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Mayfly Forms operations.
pub type Result<T> = std::result::Result<T, MayflyError>;
