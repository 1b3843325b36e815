//! Metrics-agent configuration file
//!
//! The agent polls every ten seconds, batches 1000 points with a 10000-point
//! buffer and writes to a single database output. Inputs are a fixed host set.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Filesystems the disk input ignores
pub const IGNORED_FILESYSTEMS: [&str; 7] = [
    "tmpfs", "devtmpfs", "devfs", "iso9660", "overlay", "aufs", "squashfs",
];

/// Where the agent writes and with which identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutput {
    pub urls: Vec<String>,
    pub token: String,
    pub organization: String,
    pub bucket: String,
}

#[derive(Debug, Serialize)]
pub struct AgentConfigFile {
    pub global_tags: BTreeMap<String, String>,
    pub agent: AgentSection,
    pub outputs: Outputs,
    pub inputs: Inputs,
}

#[derive(Debug, Serialize)]
pub struct AgentSection {
    pub interval: String,
    pub round_interval: bool,
    pub metric_batch_size: u32,
    pub metric_buffer_limit: u32,
    pub collection_jitter: String,
    pub flush_interval: String,
    pub flush_jitter: String,
    pub precision: String,
    pub hostname: String,
    pub omit_hostname: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            interval: "10s".to_string(),
            round_interval: true,
            metric_batch_size: 1000,
            metric_buffer_limit: 10000,
            collection_jitter: "0s".to_string(),
            flush_interval: "10s".to_string(),
            flush_jitter: "0s".to_string(),
            precision: "0s".to_string(),
            hostname: String::new(),
            omit_hostname: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Outputs {
    pub influxdb_v2: Vec<DatabaseOutput>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseOutput {
    pub urls: Vec<String>,
    pub token: String,
    pub organization: String,
    pub bucket: String,
}

#[derive(Debug, Serialize)]
pub struct Inputs {
    pub cpu: Vec<CpuInput>,
    pub disk: Vec<DiskInput>,
    pub diskio: Vec<DefaultInput>,
    pub kernel: Vec<DefaultInput>,
    pub processes: Vec<DefaultInput>,
    pub swap: Vec<DefaultInput>,
    pub system: Vec<DefaultInput>,
}

#[derive(Debug, Serialize)]
pub struct CpuInput {
    pub percpu: bool,
    pub totalcpu: bool,
    pub collect_cpu_time: bool,
    pub report_active: bool,
    pub core_tags: bool,
}

#[derive(Debug, Serialize)]
pub struct DiskInput {
    pub ignore_fs: Vec<String>,
}

/// Input with the agent's default settings
#[derive(Debug, Default, Serialize)]
pub struct DefaultInput {}

impl AgentConfigFile {
    pub fn new(output: &AgentOutput) -> Self {
        Self {
            global_tags: BTreeMap::new(),
            agent: AgentSection::default(),
            outputs: Outputs {
                influxdb_v2: vec![DatabaseOutput {
                    urls: output.urls.clone(),
                    token: output.token.clone(),
                    organization: output.organization.clone(),
                    bucket: output.bucket.clone(),
                }],
            },
            inputs: Inputs {
                cpu: vec![CpuInput {
                    percpu: true,
                    totalcpu: true,
                    collect_cpu_time: false,
                    report_active: false,
                    core_tags: false,
                }],
                disk: vec![DiskInput {
                    ignore_fs: IGNORED_FILESYSTEMS.iter().map(|s| s.to_string()).collect(),
                }],
                diskio: vec![DefaultInput::default()],
                kernel: vec![DefaultInput::default()],
                processes: vec![DefaultInput::default()],
                swap: vec![DefaultInput::default()],
                system: vec![DefaultInput::default()],
            },
        }
    }
}

/// Render the agent configuration as TOML
pub fn render_agent_config(output: &AgentOutput) -> Result<String> {
    toml::to_string(&AgentConfigFile::new(output)).context("Failed to render agent config")
}

/// Write the agent configuration to `path`, creating parent directories
pub async fn write_agent_config(path: &Path, output: &AgentOutput) -> Result<()> {
    let rendered = render_agent_config(output)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    tokio::fs::write(path, rendered)
        .await
        .with_context(|| format!("Failed to write agent config {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
            .await
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    info!("Wrote metrics agent config to {}", path.display());
    Ok(())
}
