//! Fluent API for building test configurations
//!
//! Every path the guardian touches is redirected into a temp dir, so a built
//! config never reaches the real home directory or `/etc`.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tsguard::config::{
    BackoffKind, Config, LogSettings, ReadinessConfig, ServiceMode, StorageConfig,
};

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    config: Config,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with everything under a temp dir
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();

        let staging = root.join("staging");
        fs::create_dir_all(&staging).expect("Failed to create staging dir");

        let mut config = Config::default();
        config.backup.staging_path = staging;
        config.services.agent_config_dir = root.join("agent");
        config.services.database_state_dir = root.join("state/.influxdbv2");
        config.services.agent_config_path = root.join("etc/telegraf/telegraf.conf");
        config.services.state_paths = vec![
            root.join("state/.influxdbv2/configs"),
            root.join("state/engine"),
            root.join("state/influxd.bolt"),
        ];
        config.logging = LogSettings {
            directory: root.join("logs"),
            ..LogSettings::default()
        };

        Self { temp_dir, config }
    }

    /// Seconds between backup cycles
    pub fn with_interval(mut self, seconds: u64) -> Self {
        self.config.backup.interval_seconds = seconds;
        self
    }

    /// Bucket retention in seconds
    pub fn with_retention(mut self, seconds: u64) -> Self {
        self.config.backup.retention_seconds = seconds;
        self
    }

    pub fn with_org_and_bucket(mut self, org: &str, bucket: &str) -> Self {
        self.config.backup.organization = org.to_string();
        self.config.backup.bucket = bucket.to_string();
        self
    }

    /// Upload archives to S3
    pub fn with_s3(mut self, bucket: &str, region: &str) -> Self {
        self.config.storage = StorageConfig::S3 {
            bucket: bucket.to_string(),
            region: region.to_string(),
        };
        self
    }

    /// Delegate services to the OS service manager
    pub fn external(mut self) -> Self {
        self.config.services.mode = ServiceMode::External;
        self
    }

    /// Embedded binaries, e.g. `sleep` with `["30"]` as a stand-in database
    pub fn with_binaries(mut self, database: &str, database_args: &[&str], agent: &str) -> Self {
        self.config.services.database_binary = PathBuf::from(database);
        self.config.services.database_args = database_args.iter().map(|s| s.to_string()).collect();
        self.config.services.agent_binary = PathBuf::from(agent);
        self
    }

    /// Bounded readiness with short intervals
    pub fn with_fast_readiness(mut self, max_attempts: u32) -> Self {
        self.config.readiness = ReadinessConfig {
            interval_seconds: 1,
            max_attempts: Some(max_attempts),
            deadline_seconds: None,
            backoff: BackoffKind::Fixed,
            ..ReadinessConfig::default()
        };
        self
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn staging_path(&self) -> PathBuf {
        self.config.backup.staging_path.clone()
    }

    pub fn agent_config_dir(&self) -> PathBuf {
        self.config.services.agent_config_dir.clone()
    }

    /// Build the config; the temp dir is removed when the builder drops
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and keep the temp dir alive
    pub fn persist(self) -> (Config, TempDir) {
        (self.config, self.temp_dir)
    }

    /// Write the config as TOML into the temp dir
    pub fn write_toml(&self) -> PathBuf {
        let path = self.temp_dir.path().join("tsguard.toml");
        let rendered = toml::to_string_pretty(&self.config).expect("Failed to serialize config");
        fs::write(&path, rendered).expect("Failed to write config");
        path
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
