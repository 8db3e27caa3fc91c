pub mod config;
pub mod error;
pub mod types;

pub use config::{DispatchConfig, LoadConfig, ShrinkPolicy, SimulationConfig, SurgeConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
