//! Tracing setup for the guardian
//!
//! Two sinks: coloured INFO lines on stderr, and a daily-rotated file under
//! the configured directory at the configured level. The file sink writes
//! plain text or JSON lines. `RUST_LOG`, when set, overrides both levels.

use crate::config::{expand_tilde, LogFormat, LogSettings};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Rotated files are named `tsguard.log.<date>`
const LOG_FILE_PREFIX: &str = "tsguard.log";

/// Resolved `[logging]` settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    /// File sink level; stderr stays at INFO
    pub file_level: Level,
    /// Rotated files kept after startup pruning
    pub keep_files: usize,
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn from_settings(settings: &LogSettings) -> Self {
        Self {
            directory: expand_tilde(&settings.directory),
            file_level: parse_level(&settings.level),
            keep_files: settings.max_files as usize,
            format: settings.format,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_settings(&LogSettings::default())
    }
}

/// Unknown names fall back to INFO
fn parse_level(name: &str) -> Level {
    name.trim().parse().unwrap_or(Level::INFO)
}

/// Flushes the file sink when dropped; hold it for the life of the process
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber with both sinks
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!("Failed to create log directory {}", config.directory.display())
    })?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &config.directory, LOG_FILE_PREFIX);
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let file_sink = match config.format {
        LogFormat::Text => fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(env_or(config.file_level))
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(false)
            .with_filter(env_or(config.file_level))
            .boxed(),
    };

    let stderr_sink = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_or(Level::INFO));

    tracing_subscriber::registry()
        .with(file_sink)
        .with(stderr_sink)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    let pruned = prune_rotated_logs(&config.directory, config.keep_files)?;
    if pruned > 0 {
        tracing::debug!("Pruned {} old log file(s)", pruned);
    }

    Ok(LogGuard { _worker: worker })
}

/// Stderr-only logging for commands that never start the guardian
pub fn init_console_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_or(Level::INFO))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn env_or(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()))
}

/// Delete all but the `keep` most recently modified log files
///
/// Returns how many were removed. Files that cannot be removed are skipped.
fn prune_rotated_logs(dir: &Path, keep: usize) -> Result<usize> {
    let mut logs: Vec<(SystemTime, PathBuf)> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();

    logs.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Could not prune {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}
