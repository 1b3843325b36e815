//! Backup manager - snapshot, archive, upload and clean up on a schedule

use crate::admin::{AdminClient, BackupParams};
use crate::storage::StorageDriver;
use crate::utils::archive::pack_directory_async;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Artifact names sort chronologically at one-second resolution
pub const ARTIFACT_NAME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

pub fn artifact_name(at: DateTime<Utc>) -> String {
    at.format(ARTIFACT_NAME_FORMAT).to_string()
}

/// One cycle's staged directory and its archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub name: String,
    pub dir: PathBuf,
    pub archive: PathBuf,
}

impl BackupArtifact {
    pub fn new(root: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            dir: root.join(&name),
            archive: root.join(format!("{}.tar", name)),
            name,
        }
    }

    /// Archive file name relative to the storage root
    pub fn archive_name(&self) -> String {
        format!("{}.tar", self.name)
    }
}

pub struct BackupManager {
    admin: Arc<dyn AdminClient>,
    storage: Arc<dyn StorageDriver>,
    organization: String,
    bucket: String,
}

impl BackupManager {
    pub fn new(
        admin: Arc<dyn AdminClient>,
        storage: Arc<dyn StorageDriver>,
        organization: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            admin,
            storage,
            organization: organization.into(),
            bucket: bucket.into(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageDriver> {
        &self.storage
    }

    /// Run one cycle stamped with the current time
    pub async fn run_cycle(&self) -> Result<BackupArtifact> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle; cleanup happens whatever the outcome
    ///
    /// A retaining driver keeps the archive only when the whole cycle
    /// succeeded, so a partial archive never lands in the destination.
    pub async fn run_cycle_at(&self, at: DateTime<Utc>) -> Result<BackupArtifact> {
        let artifact = BackupArtifact::new(self.storage.storage_root(), artifact_name(at));
        info!("Starting backup cycle {}", artifact.name);

        let produced = self.produce(&artifact).await;
        let keep_archive = self.storage.retains_archives() && produced.is_ok();
        let cleaned = cleanup_artifact(&artifact, keep_archive).await;

        match (produced, cleaned) {
            (Err(e), Err(cleanup_err)) => {
                warn!("Cleanup after failed cycle {} also failed: {:#}", artifact.name, cleanup_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(cleanup_err)) => Err(cleanup_err),
            (Ok(()), Ok(())) => Ok(artifact),
        }
    }

    async fn produce(&self, artifact: &BackupArtifact) -> Result<()> {
        let root = self.storage.storage_root();
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("Failed to create storage root {}", root.display()))?;

        self.admin
            .backup(&BackupParams {
                org: self.organization.clone(),
                bucket: self.bucket.clone(),
                path: artifact.dir.clone(),
            })
            .await
            .context("Backup step failed")?;

        pack_directory_async(artifact.dir.clone(), artifact.archive.clone())
            .await
            .context("Archive step failed")?;

        self.storage
            .upload(&artifact.archive_name())
            .await
            .with_context(|| format!("Upload to {} storage failed", self.storage.name()))?;

        Ok(())
    }
}

async fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

async fn remove_file_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Remove a cycle's staged files
///
/// A single failed removal is only logged. The directory error is returned
/// only when the archive removal was attempted and failed as well.
pub async fn cleanup_artifact(artifact: &BackupArtifact, keep_archive: bool) -> Result<()> {
    let dir_result = remove_dir_if_present(&artifact.dir).await;
    let archive_result = if keep_archive {
        None
    } else {
        Some(remove_file_if_present(&artifact.archive).await)
    };

    match (dir_result, archive_result) {
        (Err(dir_err), Some(Err(archive_err))) => {
            warn!("Failed to remove {}: {}", artifact.archive.display(), archive_err);
            Err(dir_err).with_context(|| format!("Failed to remove {}", artifact.dir.display()))
        }
        (Err(dir_err), None | Some(Ok(()))) => {
            warn!("Failed to remove {}: {}", artifact.dir.display(), dir_err);
            Ok(())
        }
        (Ok(()), Some(Err(archive_err))) => {
            warn!("Failed to remove {}: {}", artifact.archive.display(), archive_err);
            Ok(())
        }
        (Ok(()), _) => {
            debug!("Cleaned up artifact {}", artifact.name);
            Ok(())
        }
    }
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl LoopStats {
    /// Cycles that actually ran
    pub fn executed(&self) -> u64 {
        self.completed + self.failed
    }
}

#[derive(Default)]
struct LoopCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl LoopCounters {
    fn snapshot(&self) -> LoopStats {
        LoopStats {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Clears the in-flight flag when a cycle ends, even on panic
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn try_claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic backup schedule
///
/// The first cycle starts one interval after launch. A tick that arrives while
/// a cycle is still running is skipped, so at most one artifact is live.
pub struct BackupLoop {
    manager: Arc<BackupManager>,
    interval: Duration,
    cancel: CancellationToken,
}

impl BackupLoop {
    pub fn new(manager: Arc<BackupManager>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            manager,
            interval,
            cancel,
        }
    }

    /// Run the loop as a background task
    pub fn spawn(self) -> BackupLoopHandle {
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run());
        BackupLoopHandle { cancel, join }
    }

    async fn run(self) -> LoopStats {
        let counters = Arc::new(LoopCounters::default());
        let busy = Arc::new(AtomicBool::new(false));
        let mut in_flight: Option<JoinHandle<()>> = None;

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Backup loop started, every {:?} into {} storage",
            self.interval,
            self.manager.storage().name()
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(claim) = InFlight::try_claim(&busy) else {
                        warn!("Previous backup cycle still running, skipping this one");
                        counters.skipped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    };

                    let manager = self.manager.clone();
                    let counters = counters.clone();
                    in_flight = Some(tokio::spawn(async move {
                        let _claim = claim;
                        let started = Instant::now();
                        match manager.run_cycle().await {
                            Ok(artifact) => {
                                counters.completed.fetch_add(1, Ordering::Relaxed);
                                info!(
                                    "Backup cycle {} finished in {:.1}s",
                                    artifact.name,
                                    started.elapsed().as_secs_f64()
                                );
                            }
                            Err(e) => {
                                counters.failed.fetch_add(1, Ordering::Relaxed);
                                warn!("Backup cycle failed: {:#}", e);
                            }
                        }
                    }));
                }
            }
        }

        if let Some(cycle) = in_flight {
            if !cycle.is_finished() {
                info!("Waiting for the running backup cycle to finish");
            }
            if let Err(e) = cycle.await {
                error!("Backup cycle task failed: {}", e);
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        let stats = counters.snapshot();
        info!(
            "Backup loop stopped ({} completed, {} failed, {} skipped)",
            stats.completed, stats.failed, stats.skipped
        );
        stats
    }
}

/// Handle to a running backup loop
#[derive(Debug)]
pub struct BackupLoopHandle {
    cancel: CancellationToken,
    join: JoinHandle<LoopStats>,
}

impl BackupLoopHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop scheduling, drain the running cycle and return the counters
    pub async fn shutdown(self) -> LoopStats {
        self.cancel.cancel();
        match self.join.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Backup loop task failed: {}", e);
                LoopStats::default()
            }
        }
    }
}
