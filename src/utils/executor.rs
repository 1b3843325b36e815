//! Command execution abstraction for testability
//!
//! The external service manager and the admin CLI client run their commands
//! through a [`CommandExecutor`], so tests can record invocations and script
//! failures without touching the host.

use anyhow::Result;
use async_trait::async_trait;
use std::process::Output;
use std::time::Duration;

/// Abstraction for command execution, enabling mocking in tests
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion with optional timeout
    async fn run_command(
        &self,
        program: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<Output>;
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for RealExecutor {
    async fn run_command(
        &self,
        program: &str,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<Output> {
        super::command::run_command(program, args, timeout).await
    }
}

/// Scripted executor; records every invocation
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// One recorded invocation
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
        pub timeout: Option<Duration>,
    }

    impl CommandCall {
        /// Program and arguments joined by spaces
        pub fn line(&self) -> String {
            std::iter::once(self.program.as_str())
                .chain(self.args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        }
    }

    #[derive(Clone, Debug, Default)]
    pub enum MockResponse {
        #[default]
        Success,
        Failure { stderr: String, exit_code: i32 },
        Timeout,
    }

    /// Commands succeed with empty output unless a scripted prefix matches
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        script: Arc<Mutex<Vec<(String, MockResponse)>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer every command line starting with `prefix`
        ///
        /// The longest matching prefix wins, so `"influx"` and
        /// `"influx backup"` can be scripted side by side.
        pub fn expect(self, prefix: &str, response: MockResponse) -> Self {
            self.script
                .lock()
                .unwrap()
                .push((prefix.to_string(), response));
            self
        }

        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Recorded calls of one program
        pub fn calls_to(&self, program: &str) -> Vec<CommandCall> {
            self.get_calls()
                .into_iter()
                .filter(|c| c.program == program)
                .collect()
        }

        fn response_for(&self, line: &str) -> MockResponse {
            self.script
                .lock()
                .unwrap()
                .iter()
                .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, response)| response.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl CommandExecutor for MockExecutor {
        async fn run_command(
            &self,
            program: &str,
            args: &[&str],
            timeout: Option<Duration>,
        ) -> Result<Output> {
            let call = CommandCall {
                program: program.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                timeout,
            };
            let line = call.line();
            self.calls.lock().unwrap().push(call);

            // Same messages as the real runner
            match self.response_for(&line) {
                MockResponse::Success => Ok(Output {
                    status: std::process::ExitStatus::default(),
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                }),
                MockResponse::Failure { stderr, exit_code } => {
                    anyhow::bail!("Command failed with exit code Some({}): {}", exit_code, stderr)
                }
                MockResponse::Timeout => {
                    anyhow::bail!("{} timed out after {:?}", program, timeout.unwrap_or_default())
                }
            }
        }
    }
}
