use super::types::*;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_backup(&config.backup)?;

    if let StorageConfig::S3 { bucket, region } = &config.storage {
        if bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.bucket must not be empty".to_string(),
            ));
        }
        if region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.region must not be empty".to_string(),
            ));
        }
    }

    let readiness = &config.readiness;
    if readiness.interval_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "readiness.interval_seconds must be at least 1".to_string(),
        ));
    }
    if readiness.wait_forever && readiness.max_attempts.is_some() {
        return Err(ConfigError::ValidationError(
            "readiness.wait_forever cannot be combined with readiness.max_attempts".to_string(),
        ));
    }
    if readiness.max_attempts == Some(0) {
        return Err(ConfigError::ValidationError(
            "readiness.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.services.mode == ServiceMode::External && config.services.service_manager.is_empty() {
        return Err(ConfigError::ValidationError(
            "services.service_manager must not be empty in external mode".to_string(),
        ));
    }

    Ok(())
}

fn validate_backup(backup: &BackupJobConfig) -> Result<()> {
    // Artifact names have one-second resolution
    if backup.interval_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "backup.interval_seconds must be at least 1".to_string(),
        ));
    }

    if backup.retention_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "backup.retention_seconds must be at least 1".to_string(),
        ));
    }

    for (field, value) in [
        ("organization", &backup.organization),
        ("bucket", &backup.bucket),
        ("username", &backup.username),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "backup.{} must not be empty",
                field
            )));
        }
    }

    Ok(())
}
