//! File-based locking so only one guardian stages into a given root

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOCK_FILE_NAME: &str = ".tsguard.lock";

/// Exclusive lock on a staging root, held until dropped
pub struct InstanceLock {
    // The flock lives as long as this file descriptor
    _lock: RwLock<File>,
    lock_path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock for `staging_root`
    /// Returns error if another guardian already holds it
    pub fn acquire(staging_root: &Path) -> Result<Self> {
        let lock_path = staging_root.join(LOCK_FILE_NAME);

        debug!("Attempting to acquire lock: {:?}", lock_path);

        std::fs::create_dir_all(staging_root)
            .with_context(|| format!("Failed to create staging root {:?}", staging_root))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        let mut lock = RwLock::new(file);
        let guard = lock.try_write().with_context(|| {
            format!(
                "Staging root {:?} is already in use by another guardian (lock held)",
                staging_root
            )
        })?;
        // Keep the flock; it is released when the descriptor closes on drop
        std::mem::forget(guard);

        info!("Acquired instance lock: {:?}", lock_path);

        Ok(Self {
            _lock: lock,
            lock_path,
        })
    }

    /// Get the lock file path
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        info!("Released instance lock: {:?}", self.lock_path);

        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            debug!("Failed to remove lock file: {}", e);
        }
    }
}
