//! External services: units owned by the platform service manager
//!
//! Nothing is supervised here. Starting a service means resetting its state
//! and asking the service manager to `reload-or-restart` the unit.

use super::agent_config::write_agent_config;
use super::{AgentTarget, ServiceManager};
use crate::utils::CommandExecutor;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Unit names and paths for the external variant
#[derive(Debug, Clone)]
pub struct ExternalUnits {
    /// Service manager program, e.g. `systemctl`
    pub program: String,
    pub database_unit: String,
    pub agent_unit: String,
    pub agent_config_path: PathBuf,
    /// Database state cleared before every restart
    pub state_paths: Vec<PathBuf>,
}

pub struct ExternalServiceManager {
    units: ExternalUnits,
    target: AgentTarget,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
}

impl ExternalServiceManager {
    pub fn new(
        units: ExternalUnits,
        target: AgentTarget,
        timeout: Duration,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            units,
            target,
            timeout,
            executor,
        }
    }

    async fn restart_unit(&self, unit: &str) -> Result<()> {
        info!("Restarting {} via {}", unit, self.units.program);
        self.executor
            .run_command(
                &self.units.program,
                &["reload-or-restart", unit],
                Some(self.timeout),
            )
            .await
            .with_context(|| format!("Failed to restart {}", unit))?;
        Ok(())
    }

    /// Remove every state path, logging failures instead of returning them
    async fn clear_state(&self) {
        for path in &self.units.state_paths {
            match remove_path(path).await {
                Ok(()) => debug!("Cleared {}", path.display()),
                Err(e) => warn!("Failed to clear database state {}: {}", path.display(), e),
            }
        }
    }
}

/// Remove a file or a directory tree; a missing path is already removed
async fn remove_path(path: &Path) -> io::Result<()> {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[async_trait]
impl ServiceManager for ExternalServiceManager {
    async fn start_database(&self) -> Result<()> {
        self.clear_state().await;
        self.restart_unit(&self.units.database_unit).await
    }

    async fn start_metrics_agent(&self, token: &str) -> Result<()> {
        write_agent_config(&self.units.agent_config_path, &self.target.with_token(token)).await?;
        self.restart_unit(&self.units.agent_unit).await
    }

    async fn shutdown(&self) {
        // Units outlive the guardian
        debug!("Leaving {} units running", self.units.program);
    }

    fn name(&self) -> &'static str {
        "external"
    }
}
