//! Execution of `shell` snippets.
//!
//! Commands run through a configurable shell (`sh -c` by default) with stdout and
//! stderr captured. A timeout kills the child process.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::{DEFAULT_SHELL, DEFAULT_SHELL_TIMEOUT};
use crate::core::StackyardError;

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    /// Standard output with a single trailing newline removed
    pub stdout: String,
    /// Standard error, untouched
    pub stderr: String,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Whether the command exited with status zero
    pub success: bool,
}

/// Runs shell commands for the resolution engine.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    program: String,
    timeout_duration: Option<Duration>,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            program: DEFAULT_SHELL.to_string(),
            timeout_duration: Some(DEFAULT_SHELL_TIMEOUT),
        }
    }
}

impl ShellRunner {
    /// Create a runner using `program -c <command>`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Set a custom timeout (None for no timeout).
    #[must_use]
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `command` and capture its output.
    ///
    /// A non-zero exit is *not* an error here: the output is returned with
    /// `success == false` so the caller decides. Spawn failures and timeouts are
    /// errors.
    pub async fn run(&self, command: &str) -> Result<ShellOutput, StackyardError> {
        let start = std::time::Instant::now();
        tracing::debug!(target: "shell", "Executing: {} -c {}", self.program, command);

        let mut cmd = Command::new(&self.program);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output_future = cmd.output();
        let result = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "shell",
                        "Command timed out after {} seconds: {}",
                        duration.as_secs(),
                        command
                    );
                    return Err(StackyardError::ShellCommandFailed {
                        command: command.to_string(),
                        reason: format!("timed out after {} seconds", duration.as_secs()),
                    });
                }
            }
        } else {
            output_future.await
        };

        let output = result.map_err(|e| StackyardError::ShellCommandFailed {
            command: command.to_string(),
            reason: format!("failed to spawn '{}': {e}", self.program),
        })?;

        let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.ends_with('\n') {
            stdout.pop();
            if stdout.ends_with('\r') {
                stdout.pop();
            }
        }

        tracing::trace!(
            target: "shell",
            "Command finished in {:?} with status {:?}",
            start.elapsed(),
            output.status.code()
        );

        Ok(ShellOutput {
            stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
            success: output.status.success(),
        })
    }
}
