//! Test utilities for tsguard
//!
//! This crate provides shared builders, fixtures and a mocked collaborator
//! stack for exercising the guardian without a real database.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, MockStack};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let builder = ConfigBuilder::new().with_interval(1);
//!     let stack = MockStack::new(builder.staging_path());
//!     let mut runner = stack.runner(builder.build().backup);
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{MockStack, ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use tsguard::config::{
    BackupJobConfig, Config, ReadinessConfig, ServiceMode, ServicesConfig, StorageConfig,
};

// Re-export mock implementations from the main crate
pub use tsguard::admin::mock::{AdminCall, MockAdminClient};
pub use tsguard::readiness::mock::MockHealthProbe;
pub use tsguard::services::mock::{new_journal, Journal, MockServiceManager, ServiceCall};
pub use tsguard::storage::mock::MockStorageDriver;
pub use tsguard::storage::remote::mock::{MockObjectStore, RecordedPut};
pub use tsguard::utils::executor::mock::{CommandCall, MockExecutor, MockResponse};
pub use tsguard::utils::executor::CommandExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
