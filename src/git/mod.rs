//! Thin wrapper around the system `git` for fetching manifests from repositories.
//!
//! Only what `git+` manifest sources need is here: checking that git exists and
//! making a shallow clone of one revision. All invocations go through
//! [`command_builder::GitCommand`], which applies a timeout and disables credential
//! prompts so a missing credential fails instead of hanging.

pub mod command_builder;

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::core::StackyardError;
use crate::utils::get_git_command;
use command_builder::GitCommand;

/// Whether a `git` executable is on `PATH`.
#[must_use]
pub fn is_git_installed() -> bool {
    which::which(get_git_command()).is_ok()
}

/// Fail with [`StackyardError::GitNotFound`] unless git is available.
pub fn ensure_git_available() -> Result<()> {
    if !is_git_installed() {
        return Err(StackyardError::GitNotFound.into());
    }
    Ok(())
}

/// Shallow-clone `url` at `reference` (a branch or tag; default branch if `None`)
/// into `target`, which must not exist yet or be empty.
pub async fn shallow_clone(
    url: &str,
    reference: Option<&str>,
    target: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    ensure_git_available()?;
    tracing::info!(target: "git", "Cloning {} ({})", url, reference.unwrap_or("default branch"));

    GitCommand::shallow_clone(url, reference, target)
        .with_timeout(timeout)
        .with_context(format!("clone {url}"))
        .execute_success()
        .await
        .with_context(|| format!("Failed to clone repository: {url}"))
}

/// The installed git version string, e.g. `git version 2.43.0`.
pub async fn git_version() -> Result<String> {
    ensure_git_available()?;
    GitCommand::version().execute_stdout().await
}
