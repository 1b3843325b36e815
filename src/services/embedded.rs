//! Embedded services: the database and agent run as child processes
//!
//! Starting a service returns as soon as the process is spawned. A background
//! task then races the handle's abort token against process exit. Unexpected
//! exits are reported on the supervisor channel; deciding what to do about
//! them is the orchestrator's job.

use super::agent_config::write_agent_config;
use super::{AgentTarget, ServiceKind, ServiceManager};
use crate::error::ServiceError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const AGENT_CONFIG_FILE: &str = "telegraf.conf";

/// How a supervised process ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(ExitStatus),
    WaitFailed(String),
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(status) => write!(f, "exited with {}", status),
            ExitOutcome::WaitFailed(e) => write!(f, "could not be waited on: {}", e),
        }
    }
}

/// A managed process ended without being asked to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorEvent {
    pub service: ServiceKind,
    pub outcome: ExitOutcome,
}

impl fmt::Display for SupervisorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.service, self.outcome)
    }
}

/// A live supervised process
pub struct ServiceHandle {
    kind: ServiceKind,
    abort: CancellationToken,
    done: JoinHandle<Result<(), ServiceError>>,
}

impl ServiceHandle {
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// Ask the supervisor to kill the process
    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_finished()
    }

    /// Wait for the supervising task's verdict
    pub async fn wait(self) -> Result<(), ServiceError> {
        match self.done.await {
            Ok(result) => result,
            Err(e) => {
                error!("Supervisor task for {} failed: {}", self.kind, e);
                Err(ServiceError::Aborted { service: self.kind })
            }
        }
    }
}

/// Binaries and paths for the embedded variant
#[derive(Debug, Clone)]
pub struct EmbeddedPaths {
    pub database_binary: PathBuf,
    /// Extra database arguments; empty by default
    pub database_args: Vec<String>,
    pub agent_binary: PathBuf,
    pub agent_config_dir: PathBuf,
    /// Removed before the database starts so bootstrap can run again
    pub database_state_dir: Option<PathBuf>,
}

pub struct EmbeddedServiceManager {
    paths: EmbeddedPaths,
    target: AgentTarget,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    cancel: CancellationToken,
    handles: Mutex<HashMap<ServiceKind, ServiceHandle>>,
}

impl EmbeddedServiceManager {
    pub fn new(
        paths: EmbeddedPaths,
        target: AgentTarget,
        events: mpsc::UnboundedSender<SupervisorEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            paths,
            target,
            events,
            cancel,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Path the agent config is written to
    pub fn agent_config_path(&self) -> PathBuf {
        self.paths.agent_config_dir.join(AGENT_CONFIG_FILE)
    }

    /// Take the handle for a service, if one exists
    pub async fn take_handle(&self, kind: ServiceKind) -> Option<ServiceHandle> {
        self.handles.lock().await.remove(&kind)
    }

    /// Spawn `program` and hand it to a supervising task
    ///
    /// `prepare` runs only once the service is known not to be running, so a
    /// rejected start never touches the live process's files. `cleanup` is
    /// removed if the spawn fails or, later, when the process ends.
    async fn launch<F>(
        &self,
        kind: ServiceKind,
        program: &Path,
        args: &[&str],
        prepare: F,
        cleanup: Option<PathBuf>,
    ) -> Result<()>
    where
        F: Future<Output = Result<()>> + Send,
    {
        let mut handles = self.handles.lock().await;

        if let Some(existing) = handles.get(&kind) {
            if !existing.is_finished() {
                anyhow::bail!("{} is already running", kind);
            }
        }

        prepare.await?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                if let Some(ref path) = cleanup {
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        debug!("Failed to remove {}: {}", path.display(), e);
                    }
                }
                return Err(e)
                    .with_context(|| format!("Failed to launch {} ({})", kind, program.display()));
            }
        };

        info!(
            "Launched {} from {} (pid {:?})",
            kind,
            program.display(),
            child.id()
        );

        let abort = self.cancel.child_token();
        let done = tokio::spawn(supervise(
            kind,
            child,
            abort.clone(),
            self.events.clone(),
            cleanup,
        ));

        handles.insert(kind, ServiceHandle { kind, abort, done });
        Ok(())
    }
}

/// Race abort against exit; first to fire wins
async fn supervise(
    kind: ServiceKind,
    mut child: Child,
    abort: CancellationToken,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    cleanup: Option<PathBuf>,
) -> Result<(), ServiceError> {
    let result = tokio::select! {
        _ = abort.cancelled() => {
            info!("Stopping {}", kind);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", kind, e);
            }
            Err(ServiceError::Aborted { service: kind })
        }
        status = child.wait() => {
            let outcome = match &status {
                Ok(status) => ExitOutcome::Exited(*status),
                Err(e) => ExitOutcome::WaitFailed(e.to_string()),
            };
            error!("{} {}", kind, outcome);
            if events.send(SupervisorEvent { service: kind, outcome }).is_err() {
                debug!("No one is listening for {} exit events", kind);
            }

            match status {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(ServiceError::Exited { service: kind, status }),
                Err(source) => Err(ServiceError::Io { service: kind, source }),
            }
        }
    };

    if let Some(path) = cleanup {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!("Failed to remove {}: {}", path.display(), e);
        }
    }

    result
}

async fn remove_dir_if_present(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[async_trait]
impl ServiceManager for EmbeddedServiceManager {
    async fn start_database(&self) -> Result<()> {
        let reset = async {
            if let Some(ref state_dir) = self.paths.database_state_dir {
                remove_dir_if_present(state_dir).await.with_context(|| {
                    format!("Failed to reset database state {}", state_dir.display())
                })?;
                debug!("Reset database state at {}", state_dir.display());
            }
            Ok(())
        };

        let binary = self.paths.database_binary.clone();
        let args: Vec<&str> = self.paths.database_args.iter().map(String::as_str).collect();
        self.launch(ServiceKind::Database, &binary, &args, reset, None).await
    }

    async fn start_metrics_agent(&self, token: &str) -> Result<()> {
        let config_path = self.agent_config_path();
        let target = self.target.with_token(token);
        let write_config = write_agent_config(&config_path, &target);

        let config_arg = config_path.display().to_string();
        let binary = self.paths.agent_binary.clone();
        self.launch(
            ServiceKind::MetricsAgent,
            &binary,
            &["--config", &config_arg],
            write_config,
            Some(config_path.clone()),
        )
        .await
    }

    async fn shutdown(&self) {
        let handles: Vec<ServiceHandle> = self.handles.lock().await.drain().map(|(_, h)| h).collect();

        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let kind = handle.kind();
            match handle.wait().await {
                Ok(()) | Err(ServiceError::Aborted { .. }) => info!("{} stopped", kind),
                Err(e) => warn!("{} ended with error: {}", kind, e),
            }
        }
    }

    fn name(&self) -> &'static str {
        "embedded"
    }
}
