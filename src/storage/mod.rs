//! Destinations for finished backup archives
//!
//! The driver is chosen once from [`StorageTarget`] and never changes. Both
//! variants stage under the same root; they differ in what `upload` does and
//! in whether the archive is kept afterwards.

pub mod local;
pub mod remote;
pub mod sniff;

pub use local::LocalDriver;
pub use remote::{ObjectStore, PutObjectRequest, RemoteDriver, S3ObjectStore};

use crate::config::{expand_tilde, Config, StorageConfig};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for archive destinations
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Base directory under which artifacts are staged
    fn storage_root(&self) -> &Path;

    /// Deliver the archive named `artifact_name` (relative to the root)
    async fn upload(&self, artifact_name: &str) -> Result<()>;

    /// Whether the archive stays under the root after upload
    fn retains_archives(&self) -> bool;

    /// Get driver name (for logging)
    fn name(&self) -> &'static str;
}

/// Where archives go, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    Local {
        root: PathBuf,
    },
    Remote {
        root: PathBuf,
        bucket: String,
        region: String,
    },
}

impl StorageTarget {
    pub fn from_config(config: &Config) -> Self {
        let root = expand_tilde(&config.backup.staging_path);
        match &config.storage {
            StorageConfig::Local => StorageTarget::Local { root },
            StorageConfig::S3 { bucket, region } => StorageTarget::Remote {
                root,
                bucket: bucket.clone(),
                region: region.clone(),
            },
        }
    }

    pub fn root(&self) -> &Path {
        match self {
            StorageTarget::Local { root } | StorageTarget::Remote { root, .. } => root,
        }
    }
}

/// Build the driver for a target
pub async fn build_driver(target: &StorageTarget) -> Result<Arc<dyn StorageDriver>> {
    let driver: Arc<dyn StorageDriver> = match target {
        StorageTarget::Local { root } => Arc::new(LocalDriver::new(root.clone())),
        StorageTarget::Remote {
            root,
            bucket,
            region,
        } => {
            let store = S3ObjectStore::new(region).await;
            Arc::new(RemoteDriver::new(
                root.clone(),
                bucket.clone(),
                region.clone(),
                Arc::new(store),
            ))
        }
    };
    Ok(driver)
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Records uploads after checking the archive is really staged
    #[derive(Clone)]
    pub struct MockStorageDriver {
        root: PathBuf,
        pub uploads: Arc<Mutex<Vec<String>>>,
        should_fail: Arc<Mutex<bool>>,
        retains: bool,
    }

    impl MockStorageDriver {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                uploads: Arc::new(Mutex::new(Vec::new())),
                should_fail: Arc::new(Mutex::new(false)),
                retains: false,
            }
        }

        pub fn with_failing_upload(self) -> Self {
            *self.should_fail.lock().unwrap() = true;
            self
        }

        /// Behave like the local driver and keep archives
        pub fn retaining_archives(mut self) -> Self {
            self.retains = true;
            self
        }

        pub fn get_uploads(&self) -> Vec<String> {
            self.uploads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StorageDriver for MockStorageDriver {
        fn storage_root(&self) -> &Path {
            &self.root
        }

        async fn upload(&self, artifact_name: &str) -> Result<()> {
            if *self.should_fail.lock().unwrap() {
                anyhow::bail!("Mock upload failure for {}", artifact_name);
            }
            let path = self.root.join(artifact_name);
            if !path.is_file() {
                anyhow::bail!("Nothing staged at {}", path.display());
            }
            self.uploads.lock().unwrap().push(artifact_name.to_string());
            Ok(())
        }

        fn retains_archives(&self) -> bool {
            self.retains
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }
}
