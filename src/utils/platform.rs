//! Platform-specific paths and executables.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Whether this build targets Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// The current user's home directory.
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        let platform_help = if is_windows() {
            "On Windows: Check that the USERPROFILE environment variable is set"
        } else {
            "On Unix/Linux: Check that the HOME environment variable is set"
        };
        anyhow::anyhow!("Could not determine home directory.\n\n{platform_help}")
    })
}

/// Git executable name: `git.exe` on Windows, `git` elsewhere.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Expand a leading `~/` and `$VAR` / `${VAR}` references in `path`.
///
/// Only the current user's home is supported (`~user/...` is rejected), and
/// undefined variables are an error rather than an empty expansion.
///
/// ```rust,no_run
/// use stackyard::utils::resolve_path;
///
/// # fn example() -> anyhow::Result<()> {
/// let manifest = resolve_path("~/stacks/$STAGE.yaml")?;
/// # Ok(())
/// # }
/// ```
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    if path.starts_with('~') && !path.starts_with("~/") && path != "~" {
        anyhow::bail!(
            "Invalid path: {path}\n\n\
            Tilde expansion only supports '~/' for the home directory"
        );
    }

    let expanded =
        shellexpand::full(path).with_context(|| format!("Failed to expand path: {path}"))?;

    Ok(PathBuf::from(expanded.as_ref()))
}
