use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tsguard::config::{self, Overrides, ServiceMode};
use tsguard::services::{render_agent_config, AgentTarget};
use tsguard::storage::StorageTarget;
use tsguard::utils::InstanceLock;
use tsguard::{init_console_logging, init_logging, LoggingConfig, Runner};

#[derive(Parser)]
#[command(name = "tsguard")]
#[command(about = "Supervises a time-series database and its metrics agent, with periodic backups", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bucket retention in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    retention: Option<u64>,

    /// Seconds between backups
    #[arg(long, value_name = "SECONDS", global = true)]
    backup_interval: Option<u64>,

    /// Directory backups are staged (and locally kept) in
    #[arg(long, global = true)]
    backup_path: Option<PathBuf>,

    /// Run services as child processes or through the OS service manager
    #[arg(long, value_enum, global = true)]
    service_mode: Option<ModeArg>,

    /// Database binary for embedded mode
    #[arg(long, global = true)]
    influxd_location: Option<PathBuf>,

    /// Metrics agent binary for embedded mode
    #[arg(long, global = true)]
    telegraf_location: Option<PathBuf>,

    /// Upload archives to this S3 bucket (requires --s3-region)
    #[arg(long, global = true)]
    s3_bucket: Option<String>,

    /// Region of the S3 bucket
    #[arg(long, global = true)]
    s3_region: Option<String>,

    /// Wait for the database without a deadline
    #[arg(long, global = true)]
    wait_forever: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Embedded,
    External,
}

impl From<ModeArg> for ServiceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Embedded => ServiceMode::Embedded,
            ModeArg::External => ServiceMode::External,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start services, bootstrap the database and back it up periodically (default)
    Run,

    /// Validate configuration and print the resolved settings as JSON
    Validate,

    /// Print the metrics agent configuration for a token
    AgentConfig {
        /// Auth token the agent writes with
        #[arg(long)]
        token: String,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            retention_seconds: self.retention,
            interval_seconds: self.backup_interval,
            staging_path: self.backup_path.clone(),
            mode: self.service_mode.map(ServiceMode::from),
            database_binary: self.influxd_location.clone(),
            agent_binary: self.telegraf_location.clone(),
            s3_bucket: self.s3_bucket.clone(),
            s3_region: self.s3_region.clone(),
            wait_forever: self.wait_forever,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_or_default(cli.config.as_deref())?;
    let config = cli.overrides().apply(config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Validate => {
            let rendered =
                serde_json::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);
            Ok(())
        }
        Commands::AgentConfig { token } => {
            init_console_logging();
            let target = AgentTarget::from_config(&config.services, &config.backup);
            print!("{}", render_agent_config(&target.with_token(&token))?);
            Ok(())
        }
        Commands::Run => run(config).await,
    }
}

async fn run(config: config::Config) -> Result<()> {
    let _log_guard = init_logging(&LoggingConfig::from_settings(&config.logging))?;

    let target = StorageTarget::from_config(&config);
    let lock = InstanceLock::acquire(target.root())?;
    info!("Holding {}", lock.path().display());

    let cancel = CancellationToken::new();
    let stop = CancellationToken::new();
    tokio::spawn(watch_signals(stop.clone()));

    let (mut runner, mut events) = Runner::from_config(&config, cancel.clone()).await?;

    let started = tokio::select! {
        result = runner.run_supervised(&mut events) => Some(result),
        _ = stop.cancelled() => None,
    };

    let loop_handle = match started {
        Some(Ok(handle)) => handle,
        Some(Err(e)) => {
            error!("Guardian failed to start: {}", error_chain(&e));
            runner.shutdown().await;
            return Err(e.into());
        }
        None => {
            warn!("Interrupted during startup");
            runner.shutdown().await;
            return Ok(());
        }
    };

    let crashed = tokio::select! {
        _ = stop.cancelled() => None,
        Some(event) = events.recv() => {
            error!("Managed service stopped unexpectedly: {}", event);
            Some(event)
        }
    };

    info!("Shutting down");
    let stats = loop_handle.shutdown().await;
    runner.shutdown().await;
    info!(
        "Ran {} backup cycle(s), {} failed",
        stats.executed(),
        stats.failed
    );

    match crashed {
        Some(event) => anyhow::bail!("{}", event),
        None => Ok(()),
    }
}

/// Cancel `stop` on Ctrl-C or SIGTERM
async fn watch_signals(stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
    stop.cancel();
}

/// Render an error with its sources on one line
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
