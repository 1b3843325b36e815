//! Runner - sequences startup and launches the backup loop
//!
//! Startup is strictly ordered: database, readiness, credentials, bootstrap,
//! metrics agent. Any failure aborts the run before the loop exists. Once the
//! agent is up the loop is spawned and `run` returns without joining it.

use crate::admin::{AdminClient, InfluxCli, SetupParams};
use crate::config::{BackupJobConfig, Config};
use crate::credentials::CredentialGenerator;
use crate::error::GuardianError;
use crate::managers::backup::{BackupLoop, BackupLoopHandle, BackupManager};
use crate::readiness::{HttpHealthProbe, ReadinessGate, ReadinessPolicy};
use crate::services::{build_service_manager, ServiceKind, ServiceManager, SupervisorEvent};
use crate::storage::{build_driver, StorageDriver, StorageTarget};
use crate::utils::{CommandExecutor, RealExecutor};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Where the runner is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Created,
    StartingDatabase,
    AwaitingReadiness,
    Bootstrapping,
    StartingAgent,
    BackingUp,
    Failed,
    Stopped,
}

/// Collaborators the runner drives
pub struct RunnerDeps {
    pub services: Arc<dyn ServiceManager>,
    pub gate: ReadinessGate,
    pub admin: Arc<dyn AdminClient>,
    pub storage: Arc<dyn StorageDriver>,
    pub credentials: CredentialGenerator,
    /// Root token; the backup loop gets a child of it
    pub cancel: CancellationToken,
}

pub struct Runner {
    config: BackupJobConfig,
    deps: RunnerDeps,
    state: RunnerState,
}

impl Runner {
    pub fn new(config: BackupJobConfig, deps: RunnerDeps) -> Self {
        Self {
            config,
            deps,
            state: RunnerState::Created,
        }
    }

    /// Wire up real collaborators from configuration
    ///
    /// Also returns the channel on which embedded service exits arrive.
    pub async fn from_config(
        config: &Config,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SupervisorEvent>)> {
        let executor: Arc<dyn CommandExecutor> = Arc::new(RealExecutor::new());

        let (services, events) = build_service_manager(
            &config.services,
            &config.backup,
            executor.clone(),
            cancel.clone(),
        );
        let probe = HttpHealthProbe::new(config.readiness.health_url.clone())?;
        let gate = ReadinessGate::new(
            Arc::new(probe),
            ReadinessPolicy::from_config(&config.readiness),
        );
        let admin = InfluxCli::from_config(&config.admin, executor)?;
        let storage = build_driver(&StorageTarget::from_config(config)).await?;

        info!(
            "Using {} services, {} storage at {}",
            services.name(),
            storage.name(),
            storage.storage_root().display()
        );

        let runner = Self::new(
            config.backup.clone(),
            RunnerDeps {
                services,
                gate,
                admin: Arc::new(admin),
                storage,
                credentials: CredentialGenerator::new(),
                cancel,
            },
        );
        Ok((runner, events))
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Run the startup sequence and launch the backup loop
    ///
    /// Single use: a second call fails with [`GuardianError::AlreadyStarted`].
    pub async fn run(&mut self) -> Result<BackupLoopHandle, GuardianError> {
        if self.state != RunnerState::Created {
            return Err(GuardianError::AlreadyStarted);
        }

        match self.start().await {
            Ok(handle) => {
                self.state = RunnerState::BackingUp;
                Ok(handle)
            }
            Err(e) => {
                error!("Startup failed while {:?}: {}", self.state, e);
                self.state = RunnerState::Failed;
                Err(e)
            }
        }
    }

    /// Like [`Runner::run`], but a managed service exiting mid-startup aborts it
    ///
    /// Without this a database that dies at once leaves the readiness gate
    /// probing a dead process until its deadline, or forever when unbounded.
    pub async fn run_supervised(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<SupervisorEvent>,
    ) -> Result<BackupLoopHandle, GuardianError> {
        let exited = tokio::select! {
            result = self.run() => return result,
            Some(event) = events.recv() => event,
        };

        error!("{} during startup, giving up while {:?}", exited, self.state);
        self.state = RunnerState::Failed;
        Err(GuardianError::startup(
            exited.service,
            anyhow::anyhow!("{} before startup completed", exited),
        ))
    }

    async fn start(&mut self) -> Result<BackupLoopHandle, GuardianError> {
        self.state = RunnerState::StartingDatabase;
        info!("Starting database ({})", self.deps.services.name());
        self.deps
            .services
            .start_database()
            .await
            .map_err(|e| GuardianError::startup(ServiceKind::Database, e))?;

        self.state = RunnerState::AwaitingReadiness;
        self.deps.gate.wait(&self.deps.cancel).await?;

        self.state = RunnerState::Bootstrapping;
        let credential = self.deps.credentials.generate();
        self.deps
            .admin
            .setup(&SetupParams {
                username: self.config.username.clone(),
                password: credential.password.clone(),
                auth_token: credential.auth_token.clone(),
                org: self.config.organization.clone(),
                bucket: self.config.bucket.clone(),
                retention: Duration::from_secs(self.config.retention_seconds),
            })
            .await
            .map_err(GuardianError::bootstrap)?;

        self.state = RunnerState::StartingAgent;
        info!("Starting metrics agent");
        self.deps
            .services
            .start_metrics_agent(&credential.auth_token)
            .await
            .map_err(|e| GuardianError::startup(ServiceKind::MetricsAgent, e))?;

        let manager = BackupManager::new(
            self.deps.admin.clone(),
            self.deps.storage.clone(),
            self.config.organization.clone(),
            self.config.bucket.clone(),
        );
        let handle = BackupLoop::new(
            Arc::new(manager),
            Duration::from_secs(self.config.interval_seconds),
            self.deps.cancel.child_token(),
        )
        .spawn();

        info!("Guardian running");
        Ok(handle)
    }

    /// Stop managed services and cancel anything still waiting
    ///
    /// Drain the backup loop first; its last cycle needs the database.
    pub async fn shutdown(&mut self) {
        if self.state == RunnerState::Stopped {
            return;
        }
        self.deps.services.shutdown().await;
        self.deps.cancel.cancel();
        self.state = RunnerState::Stopped;
    }
}
