//! surge.toml configuration parser.
//!
//! ```toml
//! [dispatch]
//! min_servers = 2
//! max_servers = 10
//! threshold_high = 20
//! threshold_low = 5
//! shrink_policy = "abandon"
//!
//! [load]
//! interval_ms = 1000
//! min_batch = 1
//! max_batch = 5
//!
//! [simulation]
//! cycles = 10000
//! ```
//!
//! Every table and key is optional; missing values fall back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// What happens to a worker's private backlog when it is stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkPolicy {
    /// Discard queued requests. They are counted as abandoned.
    #[default]
    Abandon,
    /// Execute every queued request before the worker exits.
    Drain,
}

impl fmt::Display for ShrinkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShrinkPolicy::Abandon => f.write_str("abandon"),
            ShrinkPolicy::Drain => f.write_str("drain"),
        }
    }
}

impl FromStr for ShrinkPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abandon" => Ok(ShrinkPolicy::Abandon),
            "drain" => Ok(ShrinkPolicy::Drain),
            other => Err(ConfigError::UnknownShrinkPolicy(other.to_string())),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurgeConfig {
    pub dispatch: DispatchConfig,
    pub load: LoadConfig,
    pub simulation: SimulationConfig,
}

/// Pool bounds and resize thresholds for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Pool floor. Also the number of workers spawned at start.
    pub min_servers: usize,
    /// Pool ceiling.
    pub max_servers: usize,
    /// Queue depth strictly above which one worker is added per pass.
    pub threshold_high: usize,
    /// Queue depth strictly below which one worker is removed per pass.
    pub threshold_low: usize,
    /// Backlog handling for workers removed by the shrink rule or at stop.
    pub shrink_policy: ShrinkPolicy,
    /// How long the final stop waits for workers to finish their backlog
    /// before stopping them.
    pub teardown_grace_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_servers: 2,
            max_servers: 10,
            threshold_high: 20,
            threshold_low: 5,
            shrink_policy: ShrinkPolicy::Abandon,
            teardown_grace_ms: 1000,
        }
    }
}

impl DispatchConfig {
    /// Build a config with the given bounds and thresholds, keeping the
    /// default shrink policy and teardown grace.
    pub fn new(
        min_servers: usize,
        max_servers: usize,
        threshold_high: usize,
        threshold_low: usize,
    ) -> Self {
        Self {
            min_servers,
            max_servers,
            threshold_high,
            threshold_low,
            ..Self::default()
        }
    }

    pub fn with_shrink_policy(mut self, policy: ShrinkPolicy) -> Self {
        self.shrink_policy = policy;
        self
    }

    pub fn with_teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace_ms = grace.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }

    /// Check the pool-size and threshold relationships.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_servers == 0 {
            return Err(ConfigError::MinServersZero);
        }
        if self.max_servers < self.min_servers {
            return Err(ConfigError::MaxBelowMin {
                min: self.min_servers,
                max: self.max_servers,
            });
        }
        if self.threshold_low > self.threshold_high {
            return Err(ConfigError::ThresholdsInverted {
                low: self.threshold_low,
                high: self.threshold_high,
            });
        }
        Ok(())
    }
}

/// Synthetic load generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Delay between two generated batches.
    pub interval_ms: u64,
    /// Smallest batch size (inclusive).
    pub min_batch: usize,
    /// Largest batch size (inclusive).
    pub max_batch: usize,
    /// Lower service-time bound in milliseconds (inclusive).
    pub min_service_time_ms: u64,
    /// Upper service-time bound in milliseconds (exclusive).
    pub max_service_time_ms: u64,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            min_batch: 1,
            max_batch: 5,
            min_service_time_ms: 2000,
            max_service_time_ms: 5000,
            seed: None,
        }
    }
}

impl LoadConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Load("interval_ms must be positive".into()));
        }
        if self.min_batch > self.max_batch {
            return Err(ConfigError::Load(format!(
                "min_batch ({}) exceeds max_batch ({})",
                self.min_batch, self.max_batch
            )));
        }
        if self.min_service_time_ms >= self.max_service_time_ms {
            return Err(ConfigError::Load(format!(
                "service time range [{}, {}) is empty",
                self.min_service_time_ms, self.max_service_time_ms
            )));
        }
        Ok(())
    }
}

/// Time budget for a simulated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Run length in clock cycles. One cycle is one millisecond.
    pub cycles: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { cycles: 10_000 }
    }
}

impl SurgeConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SurgeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.dispatch.validate()?;
        self.load.validate()
    }
}
