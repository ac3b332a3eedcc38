pub mod config;
pub mod environment;

pub use config::{BeatConfig, CmqSettings, ConfigError, OutputConfig};
pub use environment::Environment;
