use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backup: BackupJobConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LogSettings,
}

/// Backup job settings, immutable once the runner is built
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupJobConfig {
    /// Seconds between backup cycles
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// Retention applied to the bucket at bootstrap
    #[serde(default = "default_retention")]
    pub retention_seconds: u64,

    /// Root under which artifacts are staged
    #[serde(default = "default_staging_path")]
    pub staging_path: PathBuf,

    #[serde(default = "default_organization")]
    pub organization: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_username")]
    pub username: String,
}

impl Default for BackupJobConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            retention_seconds: default_retention(),
            staging_path: default_staging_path(),
            organization: default_organization(),
            bucket: default_bucket(),
            username: default_username(),
        }
    }
}

/// How the managed services are run
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Direct child processes of the guardian
    #[default]
    Embedded,
    /// Units of the OS service manager
    External,
}

/// Managed service settings for both variants
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub mode: ServiceMode,

    /// URL the metrics agent writes to
    #[serde(default = "default_database_url")]
    pub database_url: String,

    // Embedded variant
    #[serde(default = "default_database_binary")]
    pub database_binary: PathBuf,
    /// Extra database arguments; the database normally runs without any
    #[serde(default)]
    pub database_args: Vec<String>,
    #[serde(default = "default_agent_binary")]
    pub agent_binary: PathBuf,
    #[serde(default = "default_agent_config_dir")]
    pub agent_config_dir: PathBuf,
    #[serde(default = "default_database_state_dir")]
    pub database_state_dir: PathBuf,

    // External variant
    #[serde(default = "default_service_manager")]
    pub service_manager: String,
    #[serde(default = "default_database_unit")]
    pub database_unit: String,
    #[serde(default = "default_agent_unit")]
    pub agent_unit: String,
    #[serde(default = "default_agent_config_path")]
    pub agent_config_path: PathBuf,
    #[serde(default = "default_state_paths")]
    pub state_paths: Vec<PathBuf>,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            mode: ServiceMode::default(),
            database_url: default_database_url(),
            database_binary: default_database_binary(),
            database_args: Vec::new(),
            agent_binary: default_agent_binary(),
            agent_config_dir: default_agent_config_dir(),
            database_state_dir: default_database_state_dir(),
            service_manager: default_service_manager(),
            database_unit: default_database_unit(),
            agent_unit: default_agent_unit(),
            agent_config_path: default_agent_config_path(),
            state_paths: default_state_paths(),
            command_timeout_seconds: default_command_timeout(),
        }
    }
}

/// Where finished archives land
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Local,
    S3 { bucket: String, region: String },
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Readiness gate settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadinessConfig {
    #[serde(default = "default_health_url")]
    pub health_url: String,
    #[serde(default = "default_probe_interval")]
    pub interval_seconds: u64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_deadline")]
    pub deadline_seconds: Option<u64>,
    /// Opt into waiting indefinitely for the database
    #[serde(default)]
    pub wait_forever: bool,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_max_probe_interval")]
    pub max_interval_seconds: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            health_url: default_health_url(),
            interval_seconds: default_probe_interval(),
            max_attempts: None,
            deadline_seconds: default_deadline(),
            wait_forever: false,
            backoff: BackoffKind::default(),
            max_interval_seconds: default_max_probe_interval(),
        }
    }
}

/// Database admin CLI settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_program")]
    pub program: String,
    #[serde(default = "default_admin_host")]
    pub host: String,
    #[serde(default = "default_admin_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            program: default_admin_program(),
            host: default_admin_host(),
            timeout_seconds: default_admin_timeout(),
        }
    }
}

/// Line format of the log file
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogSettings {
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_max_files")]
    pub max_files: u32,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            level: default_log_level(),
            max_files: default_log_max_files(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions

fn default_interval() -> u64 { 3600 }
fn default_retention() -> u64 { 3600 }
fn default_staging_path() -> PathBuf { PathBuf::from(".") }
fn default_organization() -> String { "tsguard".to_string() }
fn default_bucket() -> String { "telemetry".to_string() }
fn default_username() -> String { "admin".to_string() }
fn default_database_url() -> String { "http://127.0.0.1:8086".to_string() }
fn default_database_binary() -> PathBuf { PathBuf::from("/usr/local/bin/influxd") }
fn default_agent_binary() -> PathBuf { PathBuf::from("/usr/local/bin/telegraf") }
fn default_agent_config_dir() -> PathBuf { PathBuf::from(".") }
fn default_database_state_dir() -> PathBuf { PathBuf::from("~/.influxdbv2") }
fn default_service_manager() -> String { "systemctl".to_string() }
fn default_database_unit() -> String { "influxd".to_string() }
fn default_agent_unit() -> String { "telegraf".to_string() }
fn default_agent_config_path() -> PathBuf { PathBuf::from("/etc/telegraf/telegraf.conf") }
fn default_state_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("~/.influxdbv2/configs"),
        PathBuf::from("/var/lib/influxdb/engine"),
        PathBuf::from("/var/lib/influxdb/influxd.bolt"),
    ]
}
fn default_command_timeout() -> u64 { 120 }
fn default_health_url() -> String { "http://localhost:8086/health".to_string() }
fn default_probe_interval() -> u64 { 10 }
fn default_deadline() -> Option<u64> { Some(300) }
fn default_max_probe_interval() -> u64 { 60 }
fn default_admin_program() -> String { "influx".to_string() }
fn default_admin_host() -> String { "http://localhost:8086".to_string() }
fn default_admin_timeout() -> u64 { 600 }
fn default_log_directory() -> PathBuf { PathBuf::from("~/.tsguard/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
