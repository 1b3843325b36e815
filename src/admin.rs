//! Database administration: one-time setup and per-cycle snapshots
//!
//! Both operations go through the database's `influx` CLI, run via a
//! [`CommandExecutor`] so tests can stand in for the binary.

use crate::config::AdminConfig;
use crate::utils::CommandExecutor;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Arguments of the one-time bootstrap
#[derive(Clone, PartialEq, Eq)]
pub struct SetupParams {
    pub username: String,
    pub password: String,
    pub auth_token: String,
    pub org: String,
    pub bucket: String,
    pub retention: Duration,
}

impl fmt::Debug for SetupParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupParams")
            .field("username", &self.username)
            .field("password", &"***")
            .field("auth_token", &"***")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("retention", &self.retention)
            .finish()
    }
}

/// Arguments of a single snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupParams {
    pub org: String,
    pub bucket: String,
    pub path: PathBuf,
}

/// Administrative operations against the database
#[async_trait]
pub trait AdminClient: Send + Sync {
    /// Create the initial user, org and bucket
    async fn setup(&self, params: &SetupParams) -> Result<()>;

    /// Write a fresh snapshot of the bucket into `params.path`
    async fn backup(&self, params: &BackupParams) -> Result<()>;
}

/// Admin client driving the `influx` CLI
pub struct InfluxCli {
    program: String,
    host: String,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
}

impl InfluxCli {
    pub fn new(
        program: impl Into<String>,
        host: impl Into<String>,
        timeout: Duration,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            program: program.into(),
            host: host.into(),
            timeout,
            executor,
        }
    }

    /// Build from config, resolving the program on `PATH`
    pub fn from_config(config: &AdminConfig, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        let program = resolve_program(&config.program)?;
        Ok(Self::new(
            program.display().to_string(),
            config.host.clone(),
            Duration::from_secs(config.timeout_seconds),
            executor,
        ))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

/// Find an executable, either by explicit path or on `PATH`
pub fn resolve_program(program: &str) -> Result<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("{} does not exist", path.display());
    }

    which::which(program).with_context(|| format!("{} not found in PATH", program))
}

/// Retention as the CLI's duration syntax
fn format_retention(retention: Duration) -> String {
    format!("{}s", retention.as_secs())
}

#[async_trait]
impl AdminClient for InfluxCli {
    async fn setup(&self, params: &SetupParams) -> Result<()> {
        info!(
            "Bootstrapping org '{}' with bucket '{}'",
            params.org, params.bucket
        );

        let retention = format_retention(params.retention);
        let args: &[&str] = &[
            "setup",
            "--host",
            self.host.as_str(),
            "--username",
            params.username.as_str(),
            "--password",
            params.password.as_str(),
            "--token",
            params.auth_token.as_str(),
            "--org",
            params.org.as_str(),
            "--bucket",
            params.bucket.as_str(),
            "--retention",
            retention.as_str(),
            "--force",
        ];

        self.executor
            .run_command(&self.program, args, Some(self.timeout))
            .await
            .context("Database setup failed")?;
        Ok(())
    }

    async fn backup(&self, params: &BackupParams) -> Result<()> {
        debug!("Snapshotting into {}", params.path.display());

        let path = params.path.display().to_string();
        let args: &[&str] = &[
            "backup",
            "--host",
            self.host.as_str(),
            "--org",
            params.org.as_str(),
            "--bucket",
            params.bucket.as_str(),
            path.as_str(),
        ];

        self.executor
            .run_command(&self.program, args, Some(self.timeout))
            .await
            .with_context(|| format!("Snapshot into {} failed", path))?;
        Ok(())
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use crate::services::mock::Journal;
    use std::sync::Mutex;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum AdminCall {
        Setup(SetupParams),
        Backup(BackupParams),
    }

    /// Records calls; backups write a small snapshot unless told otherwise
    #[derive(Clone, Default)]
    pub struct MockAdminClient {
        pub calls: Arc<Mutex<Vec<AdminCall>>>,
        should_fail_setup: Arc<Mutex<bool>>,
        should_fail_backup: Arc<Mutex<bool>>,
        skip_snapshot: bool,
        journal: Option<Journal>,
    }

    impl MockAdminClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_journal(mut self, journal: Journal) -> Self {
            self.journal = Some(journal);
            self
        }

        pub fn with_failing_setup(self) -> Self {
            *self.should_fail_setup.lock().unwrap() = true;
            self
        }

        pub fn with_failing_backup(self) -> Self {
            *self.should_fail_backup.lock().unwrap() = true;
            self
        }

        /// Succeed without writing anything
        pub fn without_snapshot(mut self) -> Self {
            self.skip_snapshot = true;
            self
        }

        /// Toggle backup failures on a live mock
        pub fn set_backup_failing(&self, failing: bool) {
            *self.should_fail_backup.lock().unwrap() = failing;
        }

        pub fn get_calls(&self) -> Vec<AdminCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn setup_calls(&self) -> Vec<SetupParams> {
            self.get_calls()
                .into_iter()
                .filter_map(|c| match c {
                    AdminCall::Setup(p) => Some(p),
                    _ => None,
                })
                .collect()
        }

        pub fn backup_count(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, AdminCall::Backup(_)))
                .count()
        }

        fn record(&self, call: AdminCall, entry: &str) {
            self.calls.lock().unwrap().push(call);
            if let Some(ref journal) = self.journal {
                journal.lock().unwrap().push(entry.to_string());
            }
        }
    }

    #[async_trait]
    impl AdminClient for MockAdminClient {
        async fn setup(&self, params: &SetupParams) -> Result<()> {
            self.record(AdminCall::Setup(params.clone()), "setup");
            if *self.should_fail_setup.lock().unwrap() {
                anyhow::bail!("Mock setup failure");
            }
            Ok(())
        }

        async fn backup(&self, params: &BackupParams) -> Result<()> {
            self.record(AdminCall::Backup(params.clone()), "backup");
            if *self.should_fail_backup.lock().unwrap() {
                anyhow::bail!("Mock backup failure");
            }
            if !self.skip_snapshot {
                tokio::fs::create_dir_all(&params.path).await?;
                tokio::fs::write(params.path.join("snapshot.manifest"), b"{\"files\":[]}").await?;
            }
            Ok(())
        }
    }
}
