//! Configuration module for tsguard
//!
//! Configuration is read from an optional TOML file. Every key has a default,
//! so an empty file (or no file at all) describes an embedded deployment that
//! keeps its archives in the working directory.
//!
//! ## Precedence
//!
//! 1. Built-in defaults
//! 2. The TOML file
//! 3. Command-line overrides ([`Overrides`])
//!
//! ## Example Usage
//!
//! ```no_run
//! use tsguard::config;
//!
//! let config = config::load_config("tsguard.toml")?;
//! println!("backing up every {}s", config.backup.interval_seconds);
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, parse_config, validate_config, ConfigError, Result};
pub use types::*;

use std::path::{Path, PathBuf};

/// Values given on the command line, applied over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub retention_seconds: Option<u64>,
    pub interval_seconds: Option<u64>,
    pub staging_path: Option<PathBuf>,
    pub mode: Option<ServiceMode>,
    pub database_binary: Option<PathBuf>,
    pub agent_binary: Option<PathBuf>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub wait_forever: bool,
}

impl Overrides {
    /// Apply overrides and re-validate
    pub fn apply(self, mut config: Config) -> Result<Config> {
        if let Some(v) = self.retention_seconds {
            config.backup.retention_seconds = v;
        }
        if let Some(v) = self.interval_seconds {
            config.backup.interval_seconds = v;
        }
        if let Some(v) = self.staging_path {
            config.backup.staging_path = v;
        }
        if let Some(v) = self.mode {
            config.services.mode = v;
        }
        if let Some(v) = self.database_binary {
            config.services.database_binary = v;
        }
        if let Some(v) = self.agent_binary {
            config.services.agent_binary = v;
        }

        match (self.s3_bucket, self.s3_region) {
            (Some(bucket), Some(region)) => {
                config.storage = StorageConfig::S3 { bucket, region };
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::ValidationError(
                    "--s3-bucket and --s3-region must be given together".to_string(),
                ));
            }
            (None, None) => {}
        }

        if self.wait_forever {
            config.readiness.wait_forever = true;
            config.readiness.max_attempts = None;
        }

        validate_config(&config)?;
        Ok(config)
    }
}

/// Load the file if one is given, otherwise start from defaults
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

/// Expand tilde (~) in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
