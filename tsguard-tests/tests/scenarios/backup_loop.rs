//! The periodic backup loop

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_utils::fixtures::staged_names;
use test_utils::{MockAdminClient, MockStack, MockStorageDriver, TestContext};
use tokio_util::sync::CancellationToken;
use tsguard::admin::{AdminClient, BackupParams, SetupParams};
use tsguard::{BackupLoop, BackupManager};

#[tokio::test(start_paused = true)]
async fn test_one_cycle_per_interval() {
    let ctx = TestContext::new();
    let stack = MockStack::new(ctx.temp_dir());
    let handle = BackupLoop::new(
        Arc::new(stack.backup_manager()),
        Duration::from_secs(1),
        CancellationToken::new(),
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let stats = handle.shutdown().await;

    assert_eq!(stats.executed(), 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(stack.storage.get_uploads().len(), 3);
    assert!(staged_names(ctx.temp_dir()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_archive_failure_keeps_loop_alive() {
    let ctx = TestContext::new();
    let stack = MockStack::new(ctx.temp_dir()).with_admin(MockAdminClient::new().without_snapshot());
    let handle = BackupLoop::new(
        Arc::new(stack.backup_manager()),
        Duration::from_secs(1),
        CancellationToken::new(),
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!handle.is_finished());
    let stats = handle.shutdown().await;

    assert_eq!(stats.failed, 2);
    assert_eq!(stats.completed, 0);
    assert!(stack.storage.get_uploads().is_empty());
    assert!(staged_names(ctx.temp_dir()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_failures() {
    let ctx = TestContext::new();
    let stack = MockStack::new(ctx.temp_dir()).with_admin(MockAdminClient::new().with_failing_backup());
    let handle = BackupLoop::new(
        Arc::new(stack.backup_manager()),
        Duration::from_secs(1),
        CancellationToken::new(),
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    stack.admin.set_backup_failing(false);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let stats = handle.shutdown().await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_local_storage_keeps_archives() {
    let ctx = TestContext::new();
    let stack = MockStack::new(ctx.temp_dir())
        .with_storage(MockStorageDriver::new(ctx.temp_dir()).retaining_archives());
    let handle = BackupLoop::new(
        Arc::new(stack.backup_manager()),
        Duration::from_secs(1),
        CancellationToken::new(),
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    handle.shutdown().await;

    // Names come from the wall clock, so paused cycles may share one
    assert_eq!(stack.storage.get_uploads().len(), 2);
    let names = staged_names(ctx.temp_dir());
    assert!(!names.is_empty());
    assert!(names.iter().all(|n| n.ends_with(".tar")));
}

/// Backups that take longer than the loop interval
struct SlowAdmin {
    delay: Duration,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

#[async_trait]
impl AdminClient for SlowAdmin {
    async fn setup(&self, _params: &SetupParams) -> anyhow::Result<()> {
        Ok(())
    }

    async fn backup(&self, params: &BackupParams) -> anyhow::Result<()> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        tokio::fs::create_dir_all(&params.path).await?;
        tokio::fs::write(params.path.join("manifest"), b"{}").await?;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_tick_is_skipped() {
    let ctx = TestContext::new();
    let admin = Arc::new(SlowAdmin {
        delay: Duration::from_millis(2500),
        running: AtomicUsize::new(0),
        max_running: AtomicUsize::new(0),
    });
    let storage = MockStorageDriver::new(ctx.temp_dir());
    let manager = BackupManager::new(admin.clone(), Arc::new(storage.clone()), "o", "b");
    let handle = BackupLoop::new(Arc::new(manager), Duration::from_secs(1), CancellationToken::new())
        .spawn();

    tokio::time::sleep(Duration::from_millis(3200)).await;
    let stats = handle.shutdown().await;

    assert_eq!(admin.max_running.load(Ordering::SeqCst), 1);
    assert!(stats.skipped >= 1, "{:?}", stats);
    // The cycle running at shutdown is drained, not abandoned
    assert_eq!(stats.completed, 1);
    assert_eq!(storage.get_uploads().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_first_tick() {
    let ctx = TestContext::new();
    let stack = MockStack::new(ctx.temp_dir());
    let cancel = CancellationToken::new();
    let handle = BackupLoop::new(
        Arc::new(stack.backup_manager()),
        Duration::from_secs(60),
        cancel.clone(),
    )
    .spawn();

    tokio::time::sleep(Duration::from_secs(30)).await;
    cancel.cancel();
    let stats = handle.shutdown().await;

    assert_eq!(stats.executed(), 0);
    assert_eq!(stack.admin.backup_count(), 0);
}
