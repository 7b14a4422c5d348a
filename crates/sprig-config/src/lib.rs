//! Configuration for the sprig client.
//!
//! A single JSON file at `~/.sprig/config.json`, created with defaults on
//! first run. `${VAR}` and `${VAR:-default}` references are expanded from
//! the environment at load time.

pub mod config;
pub mod manager;

pub use config::{
    ApiConfig, Config, ConfigError, ConfigResult, IdentityConfig, LogLevel, LoggingConfig,
    StorageConfig,
};
pub use manager::ConfigManager;
