//! Waiting for the database to report healthy

use std::sync::Arc;
use std::time::Duration;
use test_utils::{ConfigBuilder, MockHealthProbe};
use tokio_util::sync::CancellationToken;
use tsguard::config::BackoffKind;
use tsguard::readiness::{ReadinessGate, ReadinessPolicy};
use tsguard::ReadinessError;

#[tokio::test(start_paused = true)]
async fn test_ready_after_server_errors() {
    let probe = MockHealthProbe::new([Some(500), Some(500), Some(200)]);
    let gate = ReadinessGate::new(
        Arc::new(probe.clone()),
        ReadinessPolicy::unbounded(Duration::from_secs(1)),
    );

    let attempts = gate.wait(&CancellationToken::new()).await.unwrap();

    assert_eq!(attempts, 3);
    assert_eq!(probe.probe_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_connection_refused_then_ready() {
    let probe = MockHealthProbe::new([None, None, Some(200)]);
    let gate = ReadinessGate::new(
        Arc::new(probe),
        ReadinessPolicy::unbounded(Duration::from_secs(10)),
    );

    let started = tokio::time::Instant::now();
    gate.wait(&CancellationToken::new()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_configured_attempt_cap() {
    let config = ConfigBuilder::new().with_fast_readiness(4).build();
    let policy = ReadinessPolicy::from_config(&config.readiness);
    assert!(policy.is_bounded());

    let probe = MockHealthProbe::unhealthy();
    let gate = ReadinessGate::new(Arc::new(probe.clone()), policy);

    let err = gate.wait(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ReadinessError::TimedOut { attempts: 4, .. }));
    assert_eq!(probe.probe_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_is_capped() {
    let policy = ReadinessPolicy {
        interval: Duration::from_secs(1),
        max_attempts: None,
        deadline: Some(Duration::from_secs(100)),
        backoff: BackoffKind::Exponential,
        max_interval: Duration::from_secs(8),
    };
    assert_eq!(policy.delay_after(10), Duration::from_secs(8));

    let probe = MockHealthProbe::unhealthy();
    let gate = ReadinessGate::new(Arc::new(probe.clone()), policy);
    let err = gate.wait(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ReadinessError::TimedOut { .. }));
    // 1 + 2 + 4 + 8 then every 8s until 100s
    assert!(probe.probe_count() >= 14, "{}", probe.probe_count());
}

#[tokio::test]
async fn test_wait_forever_has_no_bound() {
    let mut config = ConfigBuilder::new().with_fast_readiness(2).build();
    config.readiness.wait_forever = true;
    let policy = ReadinessPolicy::from_config(&config.readiness);
    assert!(!policy.is_bounded());

    let gate = ReadinessGate::new(Arc::new(MockHealthProbe::unhealthy()), policy);
    let cancel = CancellationToken::new();
    let waiter = {
        let cancel = cancel.clone();
        tokio::spawn(async move { gate.wait(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    cancel.cancel();
    assert_eq!(waiter.await.unwrap(), Err(ReadinessError::Cancelled));
}
