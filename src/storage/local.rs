//! Local storage: archives stay where they were staged

use super::StorageDriver;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalDriver {
    root: PathBuf,
}

impl LocalDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StorageDriver for LocalDriver {
    fn storage_root(&self) -> &Path {
        &self.root
    }

    async fn upload(&self, artifact_name: &str) -> Result<()> {
        // The staging root is the destination
        debug!("Local storage keeps {} in place", artifact_name);
        Ok(())
    }

    fn retains_archives(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
