//! Error types shared across the guardian

use crate::config::ConfigError;
use crate::services::ServiceKind;
use std::process::ExitStatus;
use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal conditions of a guardian run
#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    #[error("failed to start {service}")]
    Startup {
        service: ServiceKind,
        #[source]
        source: BoxError,
    },

    #[error("bootstrap failed")]
    Bootstrap(#[source] BoxError),

    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    #[error("runner has already been started")]
    AlreadyStarted,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GuardianError {
    pub fn startup(service: ServiceKind, error: anyhow::Error) -> Self {
        Self::Startup {
            service,
            source: error.into(),
        }
    }

    pub fn bootstrap(error: anyhow::Error) -> Self {
        Self::Bootstrap(error.into())
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ReadinessError {
    #[error("database not ready after {attempts} probe(s) in {elapsed:?}")]
    TimedOut { attempts: u32, elapsed: Duration },

    #[error("readiness wait cancelled")]
    Cancelled,
}

/// Outcome of a supervised process that did not exit cleanly
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{service} exited with {status}")]
    Exited {
        service: ServiceKind,
        status: ExitStatus,
    },

    #[error("{service} was aborted")]
    Aborted { service: ServiceKind },

    #[error("{service}: {source}")]
    Io {
        service: ServiceKind,
        #[source]
        source: std::io::Error,
    },
}
