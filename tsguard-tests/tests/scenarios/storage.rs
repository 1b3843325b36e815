//! Archive delivery

use std::sync::Arc;
use test_utils::fixtures::{fixed_time, staged_names};
use test_utils::{MockAdminClient, MockObjectStore, ResultAssertions, TestContext};
use tsguard::admin::AdminClient;
use tsguard::storage::{LocalDriver, RemoteDriver, StorageDriver};
use tsguard::BackupManager;

#[tokio::test]
async fn test_remote_upload_of_named_archive() {
    let ctx = TestContext::new();
    ctx.create_file("20240101T000000Z.tar", &[0u8; 1024]);
    let store = MockObjectStore::new();
    let driver = RemoteDriver::new(ctx.temp_dir(), "b", "r", Arc::new(store.clone()));

    driver.upload("20240101T000000Z.tar").await.assert_ok();

    let puts = store.get_puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].bucket, "b");
    assert_eq!(puts[0].key, "20240101T000000Z.tar");
    assert_eq!(puts[0].body_len, 1024);
    assert_eq!(puts[0].content_length, 1024);
    assert!(!puts[0].content_type.is_empty());
    assert_eq!(puts[0].content_disposition, "attachment");
}

#[tokio::test]
async fn test_remote_cycle_removes_everything() {
    let ctx = TestContext::new();
    let store = MockObjectStore::new();
    let storage: Arc<dyn StorageDriver> =
        Arc::new(RemoteDriver::new(ctx.temp_dir(), "b", "r", Arc::new(store.clone())));
    let admin: Arc<dyn AdminClient> = Arc::new(MockAdminClient::new());
    let manager = BackupManager::new(admin, storage, "o", "b");

    let artifact = manager.run_cycle_at(fixed_time()).await.unwrap();

    assert_eq!(artifact.name, "20240101T000000Z");
    let puts = store.get_puts();
    assert_eq!(puts[0].key, "20240101T000000Z.tar");
    assert_eq!(puts[0].content_type, "application/x-tar");
    assert!(staged_names(ctx.temp_dir()).is_empty());
}

#[tokio::test]
async fn test_remote_put_failure_fails_cycle_and_cleans_up() {
    let ctx = TestContext::new();
    let store = MockObjectStore::new().with_failing_put();
    let storage: Arc<dyn StorageDriver> =
        Arc::new(RemoteDriver::new(ctx.temp_dir(), "b", "r", Arc::new(store)));
    let manager = BackupManager::new(Arc::new(MockAdminClient::new()), storage, "o", "b");

    manager
        .run_cycle_at(fixed_time())
        .await
        .assert_err_contains("Mock put failure");
    assert!(staged_names(ctx.temp_dir()).is_empty());
}

#[tokio::test]
async fn test_remote_missing_archive() {
    let ctx = TestContext::new();
    let store = MockObjectStore::new();
    let driver = RemoteDriver::new(ctx.temp_dir(), "b", "r", Arc::new(store.clone()));

    driver.upload("absent.tar").await.assert_err_contains("absent.tar");
    assert!(store.get_puts().is_empty());
}

#[tokio::test]
async fn test_local_cycle_keeps_only_archive() {
    let ctx = TestContext::new();
    let storage: Arc<dyn StorageDriver> = Arc::new(LocalDriver::new(ctx.temp_dir()));
    let manager = BackupManager::new(Arc::new(MockAdminClient::new()), storage, "o", "b");

    manager.run_cycle_at(fixed_time()).await.unwrap();

    assert_eq!(staged_names(ctx.temp_dir()), vec!["20240101T000000Z.tar"]);
}
