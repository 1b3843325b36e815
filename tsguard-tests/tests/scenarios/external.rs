//! Services delegated to the OS service manager

use std::fs;
use std::sync::Arc;
use test_utils::{ConfigBuilder, MockExecutor, MockResponse, ResultAssertions};
use tokio_util::sync::CancellationToken;
use tsguard::services::build_service_manager;

#[tokio::test]
async fn test_unremovable_state_still_restarts() {
    let builder = ConfigBuilder::new().external();
    let blocker = builder.temp_dir().join("blocker");
    fs::write(&blocker, "regular file").unwrap();
    let removable = builder.temp_dir().join("engine");
    fs::create_dir_all(removable.join("data")).unwrap();

    let (mut config, _temp_dir) = builder.persist();
    // A path below a regular file cannot be removed (ENOTDIR)
    config.services.state_paths = vec![blocker.join("configs"), removable.clone()];

    let executor = MockExecutor::new();
    let (services, _events) = build_service_manager(
        &config.services,
        &config.backup,
        Arc::new(executor.clone()),
        CancellationToken::new(),
    );
    assert_eq!(services.name(), "external");

    services.start_database().await.assert_ok();

    assert!(!removable.exists());
    assert!(blocker.is_file());
    let calls = executor.get_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "systemctl");
    assert_eq!(calls[0].args, vec!["reload-or-restart", "influxd"]);
}

#[tokio::test]
async fn test_agent_restart_after_config_write() {
    let builder = ConfigBuilder::new()
        .external()
        .with_org_and_bucket("plant", "sensors");
    let (config, _temp_dir) = builder.persist();
    let executor = MockExecutor::new();
    let (services, mut events) = build_service_manager(
        &config.services,
        &config.backup,
        Arc::new(executor.clone()),
        CancellationToken::new(),
    );

    services.start_metrics_agent("Tok3nXyZ").await.assert_ok();

    let written = fs::read_to_string(&config.services.agent_config_path).unwrap();
    assert!(written.contains("Tok3nXyZ"));
    assert!(written.contains("sensors"));
    assert_eq!(executor.get_calls()[0].args, vec!["reload-or-restart", "telegraf"]);
    // Nothing is supervised, so no exit events ever arrive
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_restart_failure_is_reported() {
    let (config, _temp_dir) = ConfigBuilder::new().external().persist();
    let executor = MockExecutor::new().expect(
        "systemctl reload-or-restart",
        MockResponse::Failure {
            stderr: "Unit influxd.service not found.".to_string(),
            exit_code: 5,
        },
    );
    let (services, _events) = build_service_manager(
        &config.services,
        &config.backup,
        Arc::new(executor),
        CancellationToken::new(),
    );

    services.start_database().await.assert_err_contains("influxd");
}

#[tokio::test]
async fn test_shutdown_leaves_units_alone() {
    let (config, _temp_dir) = ConfigBuilder::new().external().persist();
    let executor = MockExecutor::new();
    let (services, _events) = build_service_manager(
        &config.services,
        &config.backup,
        Arc::new(executor.clone()),
        CancellationToken::new(),
    );

    services.shutdown().await;
    assert!(executor.get_calls().is_empty());
}
