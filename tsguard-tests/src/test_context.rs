//! Test context and harness
//!
//! [`TestContext`] owns a temp dir; [`MockStack`] wires a [`Runner`] to mock
//! collaborators that share one call journal.

use anyhow::{Context, Result};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tsguard::admin::mock::MockAdminClient;
use tsguard::config::BackupJobConfig;
use tsguard::credentials::CredentialGenerator;
use tsguard::managers::backup::BackupManager;
use tsguard::readiness::mock::MockHealthProbe;
use tsguard::readiness::{ReadinessGate, ReadinessPolicy};
use tsguard::services::mock::{new_journal, Journal, MockServiceManager};
use tsguard::storage::mock::MockStorageDriver;
use tsguard::{Runner, RunnerDeps};

/// A scratch directory that disappears with the test
pub struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn create_subdir(&self, name: &str) -> PathBuf {
        let dir = self.temp_dir().join(name);
        std::fs::create_dir_all(&dir).expect("Failed to create subdirectory");
        dir
    }

    /// Write `content` to `name`, creating parents as needed
    pub fn create_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let file = self.temp_dir().join(name);
        let parent = file.parent().unwrap_or(self.temp_dir());
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        std::fs::write(&file, content).expect("Failed to write file");
        file
    }

    pub fn read_file(&self, name: &str) -> Result<String> {
        let file = self.temp_dir().join(name);
        std::fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Mocked collaborators sharing one journal
#[derive(Clone)]
pub struct MockStack {
    pub journal: Journal,
    pub services: MockServiceManager,
    pub admin: MockAdminClient,
    pub probe: MockHealthProbe,
    pub storage: MockStorageDriver,
    pub cancel: CancellationToken,
}

impl MockStack {
    /// Healthy database, working admin, storage rooted at `staging`
    pub fn new(staging: impl Into<PathBuf>) -> Self {
        let journal = new_journal();
        Self {
            services: MockServiceManager::new().with_journal(journal.clone()),
            admin: MockAdminClient::new().with_journal(journal.clone()),
            probe: MockHealthProbe::healthy().with_journal(journal.clone()),
            storage: MockStorageDriver::new(staging),
            cancel: CancellationToken::new(),
            journal,
        }
    }

    pub fn with_services(mut self, services: MockServiceManager) -> Self {
        self.services = services.with_journal(self.journal.clone());
        self
    }

    pub fn with_admin(mut self, admin: MockAdminClient) -> Self {
        self.admin = admin.with_journal(self.journal.clone());
        self
    }

    pub fn with_probe(mut self, probe: MockHealthProbe) -> Self {
        self.probe = probe.with_journal(self.journal.clone());
        self
    }

    pub fn with_storage(mut self, storage: MockStorageDriver) -> Self {
        self.storage = storage;
        self
    }

    /// A runner over these mocks; the gate polls every millisecond
    pub fn runner(&self, config: BackupJobConfig) -> Runner {
        self.runner_with_policy(config, ReadinessPolicy::unbounded(Duration::from_millis(1)))
    }

    pub fn runner_with_policy(&self, config: BackupJobConfig, policy: ReadinessPolicy) -> Runner {
        Runner::new(
            config,
            RunnerDeps {
                services: Arc::new(self.services.clone()),
                gate: ReadinessGate::new(Arc::new(self.probe.clone()), policy),
                admin: Arc::new(self.admin.clone()),
                storage: Arc::new(self.storage.clone()),
                credentials: CredentialGenerator::from_seed(42),
                cancel: self.cancel.clone(),
            },
        )
    }

    /// A backup manager over the admin and storage mocks
    pub fn backup_manager(&self) -> BackupManager {
        BackupManager::new(
            Arc::new(self.admin.clone()),
            Arc::new(self.storage.clone()),
            "tsguard",
            "telemetry",
        )
    }

    pub fn journal_entries(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

/// Panicking shorthands for results in tests
pub trait ResultAssertions<T, E> {
    fn assert_ok(self) -> T;

    fn assert_err(self) -> E;

    /// The error's debug rendering (which for anyhow includes every cause)
    /// must mention `needle`
    fn assert_err_contains(self, needle: &str) -> E;
}

impl<T: Debug, E: Debug> ResultAssertions<T, E> for std::result::Result<T, E> {
    fn assert_ok(self) -> T {
        self.unwrap_or_else(|e| panic!("Expected Ok, got Err: {:?}", e))
    }

    fn assert_err(self) -> E {
        match self {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    }

    fn assert_err_contains(self, needle: &str) -> E {
        let err = self.assert_err();
        let rendered = format!("{:?}", err);
        assert!(rendered.contains(needle), "{:?} not found in error: {}", needle, rendered);
        err
    }
}
