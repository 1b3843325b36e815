//! Utilities for running commands with proper error handling and timeouts

use anyhow::{Context, Result};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

/// Run a command to completion with optional timeout
///
/// Non-zero exit is an error carrying stderr.
pub async fn run_command(program: &str, args: &[&str], timeout: Option<Duration>) -> Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    debug!("Running command: {} {}", program, redact_args(args).join(" "));

    let output = if let Some(timeout_duration) = timeout {
        match tokio::time::timeout(timeout_duration, cmd.output()).await {
            Ok(output) => output.context(format!("Failed to execute {}", program))?,
            Err(_) => anyhow::bail!("{} timed out after {:?}", program, timeout_duration),
        }
    } else {
        cmd.output()
            .await
            .context(format!("Failed to execute {}", program))?
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Command failed: {} {}", program, redact_args(args).join(" "));
        error!("Stderr: {}", stderr);
        anyhow::bail!(
            "Command failed with exit code {:?}: {}",
            output.status.code(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout);
    }

    Ok(output)
}

/// Hide the value following any secret-bearing flag
pub fn redact_args<'a>(args: &[&'a str]) -> Vec<&'a str> {
    const SECRET_FLAGS: [&str; 2] = ["--password", "--token"];

    let mut redacted = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            redacted.push("***");
            hide_next = false;
            continue;
        }
        hide_next = SECRET_FLAGS.contains(arg);
        redacted.push(*arg);
    }
    redacted
}
