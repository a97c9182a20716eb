//! Builder for running the system `git` with a timeout and consistent errors.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::GIT_CLONE_TIMEOUT;
use crate::core::StackyardError;
use crate::utils::get_git_command;

/// A git invocation.
///
/// ```rust,no_run
/// use stackyard::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let head = GitCommand::new()
///     .args(["rev-parse", "HEAD"])
///     .current_dir("/path/to/repo")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        // Never wait on a credential prompt.
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            timeout_duration: Some(GIT_CLONE_TIMEOUT),
            context: None,
        }
        .env("GIT_TERMINAL_PROMPT", "0")
    }
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run as `git -C <dir> ...`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a custom timeout (None for no timeout).
    #[must_use]
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label included in log lines.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Run the command, failing on a non-zero exit or a timeout.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();

        let mut full_args = Vec::new();
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());

        match &self.context {
            Some(ctx) => tracing::debug!(
                target: "git",
                "({}) Executing command: {} {}",
                ctx,
                git_command,
                full_args.join(" ")
            ),
            None => tracing::debug!(
                target: "git",
                "Executing command: {} {}",
                git_command,
                full_args.join(" ")
            ),
        }

        let mut cmd = Command::new(git_command);
        cmd.args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        let output_future = cmd.output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "Command timed out after {} seconds: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    );
                    return Err(StackyardError::GitCommandError {
                        operation,
                        stderr: format!(
                            "timed out after {} seconds (network issue or a credential prompt?)",
                            duration.as_secs()
                        ),
                    }
                    .into());
                }
            },
            None => output_future.await,
        };

        let output = match output {
            Ok(output) => output,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StackyardError::GitNotFound.into());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to execute git {}", full_args.join(" ")));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "Command failed with exit code {:?}: {}",
                output.status.code(),
                stderr.trim()
            );
            return Err(StackyardError::GitCommandError {
                operation,
                stderr: if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                },
            }
            .into());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "Git {} took {:.2}s", operation, elapsed.as_secs_f64());
        } else {
            tracing::trace!(target: "git::perf", "Git {} took {}ms", operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Run the command and return trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Captured output of a successful command.
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl GitCommand {
    /// `git clone --depth 1 [--branch <reference>] <url> <target>`
    pub fn shallow_clone(url: &str, reference: Option<&str>, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args(["clone", "--depth", "1", "--quiet"]);
        if let Some(reference) = reference {
            cmd = cmd.args(["--branch", reference]);
        }
        cmd.arg(url).arg(target.as_ref().display().to_string())
    }

    /// `git --version`
    pub fn version() -> Self {
        Self::new().arg("--version")
    }
}
