//! Lifecycle management for the database and the metrics agent
//!
//! Two interchangeable [`ServiceManager`] variants exist:
//! - [`EmbeddedServiceManager`] runs both services as supervised child processes.
//! - [`ExternalServiceManager`] delegates to the OS service manager.
//!
//! The variant is picked once by [`build_service_manager`].

pub mod agent_config;
pub mod embedded;
pub mod external;

pub use agent_config::{render_agent_config, write_agent_config, AgentOutput};
pub use embedded::{EmbeddedServiceManager, ExitOutcome, ServiceHandle, SupervisorEvent};
pub use external::ExternalServiceManager;

use crate::config::{expand_tilde, BackupJobConfig, ServiceMode, ServicesConfig};
use crate::utils::CommandExecutor;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Identity of a managed service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Database,
    MetricsAgent,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Database => write!(f, "database"),
            ServiceKind::MetricsAgent => write!(f, "metrics agent"),
        }
    }
}

/// Capability the runner needs from a service manager
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Start (or restart) the database service
    async fn start_database(&self) -> Result<()>;

    /// Start (or restart) the metrics agent, writing with `token`
    async fn start_metrics_agent(&self, token: &str) -> Result<()>;

    /// Stop whatever this manager supervises
    async fn shutdown(&self);

    /// Get variant name (for logging)
    fn name(&self) -> &'static str;
}

/// Agent output settings minus the token, known before bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTarget {
    pub urls: Vec<String>,
    pub organization: String,
    pub bucket: String,
}

impl AgentTarget {
    pub fn from_config(services: &ServicesConfig, backup: &BackupJobConfig) -> Self {
        Self {
            urls: vec![services.database_url.clone()],
            organization: backup.organization.clone(),
            bucket: backup.bucket.clone(),
        }
    }

    pub fn with_token(&self, token: &str) -> AgentOutput {
        AgentOutput {
            urls: self.urls.clone(),
            token: token.to_string(),
            organization: self.organization.clone(),
            bucket: self.bucket.clone(),
        }
    }
}

/// Build the configured variant
///
/// The receiver yields exits of embedded services; for the external variant
/// it is closed from the start.
pub fn build_service_manager(
    services: &ServicesConfig,
    backup: &BackupJobConfig,
    executor: Arc<dyn CommandExecutor>,
    cancel: CancellationToken,
) -> (Arc<dyn ServiceManager>, mpsc::UnboundedReceiver<SupervisorEvent>) {
    let target = AgentTarget::from_config(services, backup);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let manager: Arc<dyn ServiceManager> = match services.mode {
        ServiceMode::Embedded => Arc::new(EmbeddedServiceManager::new(
            embedded::EmbeddedPaths {
                database_binary: services.database_binary.clone(),
                database_args: services.database_args.clone(),
                agent_binary: services.agent_binary.clone(),
                agent_config_dir: expand_tilde(&services.agent_config_dir),
                database_state_dir: Some(expand_tilde(&services.database_state_dir)),
            },
            target,
            events_tx,
            cancel,
        )),
        ServiceMode::External => {
            drop(events_tx);
            Arc::new(ExternalServiceManager::new(
                external::ExternalUnits {
                    program: services.service_manager.clone(),
                    database_unit: services.database_unit.clone(),
                    agent_unit: services.agent_unit.clone(),
                    agent_config_path: expand_tilde(&services.agent_config_path),
                    state_paths: services.state_paths.iter().map(|p| expand_tilde(p)).collect(),
                },
                target,
                Duration::from_secs(services.command_timeout_seconds),
                executor,
            ))
        }
    };

    (manager, events_rx)
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Call log shared between mocks to check cross-collaborator ordering
    pub type Journal = Arc<Mutex<Vec<String>>>;

    pub fn new_journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ServiceCall {
        StartDatabase,
        StartMetricsAgent { token: String },
        Shutdown,
    }

    #[derive(Clone, Default)]
    pub struct MockServiceManager {
        pub calls: Arc<Mutex<Vec<ServiceCall>>>,
        pub should_fail_database: Arc<Mutex<bool>>,
        pub should_fail_agent: Arc<Mutex<bool>>,
        journal: Option<Journal>,
    }

    impl MockServiceManager {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_journal(mut self, journal: Journal) -> Self {
            self.journal = Some(journal);
            self
        }

        /// Configure database start to fail
        pub fn with_failing_database(self) -> Self {
            *self.should_fail_database.lock().unwrap() = true;
            self
        }

        /// Configure agent start to fail
        pub fn with_failing_agent(self) -> Self {
            *self.should_fail_agent.lock().unwrap() = true;
            self
        }

        pub fn get_calls(&self) -> Vec<ServiceCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn agent_started(&self) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| matches!(c, ServiceCall::StartMetricsAgent { .. }))
        }

        fn record_call(&self, call: ServiceCall, entry: &str) {
            self.calls.lock().unwrap().push(call);
            if let Some(ref journal) = self.journal {
                journal.lock().unwrap().push(entry.to_string());
            }
        }
    }

    #[async_trait]
    impl ServiceManager for MockServiceManager {
        async fn start_database(&self) -> Result<()> {
            self.record_call(ServiceCall::StartDatabase, "start_database");
            if *self.should_fail_database.lock().unwrap() {
                anyhow::bail!("Mock database start failure");
            }
            Ok(())
        }

        async fn start_metrics_agent(&self, token: &str) -> Result<()> {
            self.record_call(
                ServiceCall::StartMetricsAgent {
                    token: token.to_string(),
                },
                "start_metrics_agent",
            );
            if *self.should_fail_agent.lock().unwrap() {
                anyhow::bail!("Mock agent start failure");
            }
            Ok(())
        }

        async fn shutdown(&self) {
            self.record_call(ServiceCall::Shutdown, "shutdown");
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }
}
