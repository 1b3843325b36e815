//! Unit tests for configuration loading and overrides

use rstest::rstest;
use test_utils::{external_s3_config_toml, minimal_config_toml, render_template, TestContext};
use tsguard::config::{load_config, BackoffKind, Overrides, ServiceMode, StorageConfig};
use tsguard::readiness::ReadinessPolicy;

#[test]
fn test_minimal_file_keeps_defaults() {
    let ctx = TestContext::new();
    let staging = ctx.create_subdir("staging");
    let path = ctx.create_file(
        "tsguard.toml",
        render_template(minimal_config_toml(), &staging).as_bytes(),
    );

    let config = load_config(&path).unwrap();

    assert_eq!(config.backup.interval_seconds, 60);
    assert_eq!(config.backup.staging_path, staging);
    assert_eq!(config.services.mode, ServiceMode::Embedded);
    assert_eq!(config.storage, StorageConfig::Local);
}

#[test]
fn test_external_s3_file() {
    let ctx = TestContext::new();
    let staging = ctx.create_subdir("staging");
    let path = ctx.create_file(
        "tsguard.toml",
        render_template(external_s3_config_toml(), &staging).as_bytes(),
    );

    let config = load_config(&path).unwrap();

    assert_eq!(config.services.mode, ServiceMode::External);
    assert_eq!(config.services.database_unit, "influxdb");
    assert_eq!(config.services.agent_unit, "telegraf");
    assert_eq!(config.backup.organization, "plant");
    assert!(matches!(config.storage, StorageConfig::S3 { ref region, .. } if region == "eu-west-1"));

    let policy = ReadinessPolicy::from_config(&config.readiness);
    assert_eq!(policy.max_attempts, Some(30));
    assert_eq!(policy.backoff, BackoffKind::Exponential);
}

#[rstest]
#[case("[backup]\ninterval_seconds = 0\n", "interval")]
#[case("[backup]\nretention_seconds = 0\n", "retention")]
#[case("[backup]\norganization = \"\"\n", "organization")]
#[case("[storage]\ntype = \"s3\"\nbucket = \"\"\nregion = \"r\"\n", "bucket")]
#[case("[readiness]\nwait_forever = true\nmax_attempts = 3\n", "wait_forever")]
fn test_invalid_files_are_rejected(#[case] contents: &str, #[case] needle: &str) {
    let ctx = TestContext::new();
    let path = ctx.create_file("bad.toml", contents.as_bytes());

    let err = load_config(&path).unwrap_err();
    assert!(
        err.to_string().contains(needle),
        "'{}' does not mention '{}'",
        err,
        needle
    );
}

#[test]
fn test_unparseable_file() {
    let ctx = TestContext::new();
    let path = ctx.create_file("broken.toml", b"[backup\ninterval_seconds = ");
    assert!(load_config(&path).is_err());
}

#[test]
fn test_overrides_take_precedence_over_file() {
    let ctx = TestContext::new();
    let staging = ctx.create_subdir("staging");
    let path = ctx.create_file(
        "tsguard.toml",
        render_template(external_s3_config_toml(), &staging).as_bytes(),
    );
    let config = load_config(&path).unwrap();

    let overrides = Overrides {
        interval_seconds: Some(30),
        mode: Some(ServiceMode::Embedded),
        wait_forever: true,
        ..Overrides::default()
    };
    let config = overrides.apply(config).unwrap();

    assert_eq!(config.backup.interval_seconds, 30);
    assert_eq!(config.services.mode, ServiceMode::Embedded);
    assert!(config.readiness.wait_forever);
    assert!(!ReadinessPolicy::from_config(&config.readiness).is_bounded());
    // Untouched keys keep the file's value
    assert_eq!(config.backup.retention_seconds, 604800);
}

#[test]
fn test_missing_file_is_read_error() {
    let ctx = TestContext::new();
    let err = load_config(ctx.temp_dir().join("absent.toml")).unwrap_err();
    assert!(matches!(err, tsguard::config::ConfigError::ReadError(_)));
}
