//! Configuration management for reelgrab
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use reelgrab::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `REELGRAB__<section>__<key>`
//!
//! Examples:
//! - `REELGRAB__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `REELGRAB__PROVIDERS__HTTP_TIMEOUT=8s`
//! - `REELGRAB__PROVIDERS__BROWSER__ENABLED=true`
//! - `REELGRAB__FETCHER__MAX_ARTIFACT_BYTES=200MB`
//!
//! `RAPIDAPI_KEY` is the only secret and is read from the environment alone.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/reelgrab.toml`.
//! This can be overridden using the `REELGRAB_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{
    BrowserConfig, Config, ExtractorConfig, FetcherConfig, ProvidersConfig, ServerConfig,
    TelemetryConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`REELGRAB__*`)
    /// 2. TOML file (default: `config/reelgrab.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (zero timeouts, provider chain longer than the request budget, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}
