//! tsguard library
//!
//! Provisions a time-series database and its metrics agent, keeps them
//! running, and snapshots the database on a fixed schedule.

pub mod admin;
pub mod config;
pub mod credentials;
pub mod error;
pub mod managers;
pub mod readiness;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config, Overrides};
pub use error::{GuardianError, ReadinessError, ServiceError};
pub use managers::backup::{BackupLoop, BackupLoopHandle, BackupManager, LoopStats};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::runner::{Runner, RunnerDeps, RunnerState};
