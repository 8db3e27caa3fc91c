//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
///
/// Every variant is fatal: invalid configuration is rejected when the
/// dispatcher is built and never corrected silently.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("min_servers must be at least 1")]
    MinServersZero,

    #[error("max_servers ({max}) must be greater than or equal to min_servers ({min})")]
    MaxBelowMin { min: usize, max: usize },

    #[error("threshold_low ({low}) must be less than or equal to threshold_high ({high})")]
    ThresholdsInverted { low: usize, high: usize },

    #[error("invalid load generator config: {0}")]
    Load(String),

    #[error("unknown shrink policy: {0} (expected \"abandon\" or \"drain\")")]
    UnknownShrinkPolicy(String),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
