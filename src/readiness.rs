//! Readiness gate: block until the database health endpoint answers 200
//!
//! Polling is bounded by default (a deadline and/or an attempt cap) and can
//! back off exponentially. Waiting forever is an explicit opt-in through
//! [`ReadinessPolicy::unbounded`].

use crate::config::{BackoffKind, ReadinessConfig};
use crate::error::ReadinessError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A single health check returning the HTTP status code
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<u16>;
}

/// Probe backed by an HTTP GET
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self) -> Result<u16> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Health check against {} failed", self.url))?;
        Ok(response.status().as_u16())
    }
}

/// When to give up and how long to sleep between probes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
    pub backoff: BackoffKind,
    pub max_interval: Duration,
}

impl ReadinessPolicy {
    /// Fixed interval, no attempt cap, no deadline
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
            backoff: BackoffKind::Fixed,
            max_interval: interval,
        }
    }

    pub fn from_config(config: &ReadinessConfig) -> Self {
        let interval = Duration::from_secs(config.interval_seconds);
        let max_interval = Duration::from_secs(config.max_interval_seconds).max(interval);

        if config.wait_forever {
            return Self {
                backoff: config.backoff,
                max_interval,
                ..Self::unbounded(interval)
            };
        }

        Self {
            interval,
            max_attempts: config.max_attempts,
            deadline: config.deadline_seconds.map(Duration::from_secs),
            backoff: config.backoff,
            max_interval,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some() || self.deadline.is_some()
    }

    /// Sleep before the probe following failed attempt number `attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffKind::Fixed => self.interval,
            BackoffKind::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.interval
                    .checked_mul(factor)
                    .unwrap_or(self.max_interval)
                    .min(self.max_interval)
            }
        }
    }
}

pub struct ReadinessGate {
    probe: Arc<dyn HealthProbe>,
    policy: ReadinessPolicy,
}

impl ReadinessGate {
    pub fn new(probe: Arc<dyn HealthProbe>, policy: ReadinessPolicy) -> Self {
        Self { probe, policy }
    }

    pub fn policy(&self) -> &ReadinessPolicy {
        &self.policy
    }

    /// Probe until a 200 arrives, returning the number of probes made
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<u32, ReadinessError> {
        let started = Instant::now();
        let mut attempts = 0u32;

        if !self.policy.is_bounded() {
            info!("Waiting for database without a deadline");
        }

        loop {
            if cancel.is_cancelled() {
                return Err(ReadinessError::Cancelled);
            }

            attempts += 1;
            match self.probe.probe().await {
                Ok(200) => {
                    info!("Database ready after {} probe(s)", attempts);
                    return Ok(attempts);
                }
                Ok(status) => debug!("Database not ready yet (HTTP {})", status),
                Err(e) => debug!("Database not reachable yet: {:#}", e),
            }

            let elapsed = started.elapsed();
            if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                warn!("Giving up on database after {} probe(s)", attempts);
                return Err(ReadinessError::TimedOut { attempts, elapsed });
            }

            let mut delay = self.policy.delay_after(attempts);
            if let Some(deadline) = self.policy.deadline {
                if elapsed >= deadline {
                    warn!("Database not ready within {:?}", deadline);
                    return Err(ReadinessError::TimedOut { attempts, elapsed });
                }
                delay = delay.min(deadline - elapsed);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(ReadinessError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Scripted probe for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use crate::services::mock::Journal;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays a status sequence; `None` entries act as connection errors.
    /// Once the script runs out the last entry repeats.
    #[derive(Clone, Default)]
    pub struct MockHealthProbe {
        script: Arc<Mutex<VecDeque<Option<u16>>>>,
        last: Arc<Mutex<Option<u16>>>,
        pub probes: Arc<Mutex<u32>>,
        journal: Option<Journal>,
    }

    impl MockHealthProbe {
        pub fn new(script: impl IntoIterator<Item = Option<u16>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into_iter().collect())),
                ..Self::default()
            }
        }

        /// Healthy from the first probe
        pub fn healthy() -> Self {
            Self::new([Some(200)])
        }

        /// Never healthy
        pub fn unhealthy() -> Self {
            Self::new([Some(503)])
        }

        pub fn with_journal(mut self, journal: Journal) -> Self {
            self.journal = Some(journal);
            self
        }

        pub fn probe_count(&self) -> u32 {
            *self.probes.lock().unwrap()
        }
    }

    #[async_trait]
    impl HealthProbe for MockHealthProbe {
        async fn probe(&self) -> Result<u16> {
            *self.probes.lock().unwrap() += 1;
            if let Some(ref journal) = self.journal {
                journal.lock().unwrap().push("probe".to_string());
            }

            let next = match self.script.lock().unwrap().pop_front() {
                Some(entry) => {
                    *self.last.lock().unwrap() = entry;
                    entry
                }
                None => *self.last.lock().unwrap(),
            };

            next.ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }
}
