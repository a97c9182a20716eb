//! The global configuration file.
//!
//! ```toml
//! [resolution]
//! strict = false            # fail on shell/function errors instead of logging them
//! shell = "sh"              # program run as `<shell> -c <command>` for shell snippets
//! shell_timeout_secs = 60   # 0 disables the timeout
//!
//! [sources]
//! http_timeout_secs = 30
//! git_timeout_secs = 120
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_SHELL, DEFAULT_SHELL_TIMEOUT, GIT_CLONE_TIMEOUT,
    HTTP_FETCH_TIMEOUT,
};
use crate::core::StackyardError;
use crate::functions::FunctionRegistry;
use crate::source::SourceSettings;
use crate::utils::get_home_dir;
use crate::variables::{EnvLookup, ResolutionMode, ResolveContext, ShellRunner};

/// User-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    pub resolution: ResolutionConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Abort on failing shell snippets and functions.
    pub strict: bool,
    pub shell: String,
    /// Per-command limit for shell snippets; `0` disables it.
    pub shell_timeout_secs: u64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            strict: false,
            shell: DEFAULT_SHELL.to_string(),
            shell_timeout_secs: DEFAULT_SHELL_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    pub http_timeout_secs: u64,
    pub git_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: HTTP_FETCH_TIMEOUT.as_secs(),
            git_timeout_secs: GIT_CLONE_TIMEOUT.as_secs(),
        }
    }
}

impl GlobalConfig {
    /// `~/.stackyard/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        Ok(get_home_dir()?.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when `None`.
    /// A missing file yields defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if fs::try_exists(&path).await.unwrap_or(false) {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, self.to_toml()?)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    fn validate(&self) -> Result<(), StackyardError> {
        if self.resolution.shell.trim().is_empty() {
            return Err(StackyardError::ConfigError {
                message: "resolution.shell must not be empty".to_string(),
            });
        }
        if self.sources.http_timeout_secs == 0 || self.sources.git_timeout_secs == 0 {
            return Err(StackyardError::ConfigError {
                message: "source timeouts must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// The shell runner described by `[resolution]`.
    pub fn shell_runner(&self) -> ShellRunner {
        let timeout = match self.resolution.shell_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        ShellRunner::new(&self.resolution.shell).with_timeout(timeout)
    }

    /// Resolution context for planning. `force_strict` wins over the file.
    pub fn resolve_context(&self, force_strict: bool) -> ResolveContext {
        ResolveContext::new(Arc::new(FunctionRegistry::with_builtins()))
            .with_shell(self.shell_runner())
            .with_env(EnvLookup::process())
            .with_mode(ResolutionMode::from_strict(force_strict || self.resolution.strict))
    }

    pub const fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            http_timeout: Duration::from_secs(self.sources.http_timeout_secs),
            git_timeout: Duration::from_secs(self.sources.git_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config =
            GlobalConfig::load_with_optional(Some(temp.path().join("absent.toml"))).await.unwrap();
        assert_eq!(config, GlobalConfig::default());
        assert_eq!(config.resolution.shell, "sh");
        assert_eq!(config.sources.git_timeout_secs, 120);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = GlobalConfig::default();
        config.resolution.strict = true;
        config.resolution.shell_timeout_secs = 5;
        config.save_to(&path).await.unwrap();

        let loaded = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[resolution]\nshell = \"bash\"\n").await.unwrap();

        let config = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(config.resolution.shell, "bash");
        assert_eq!(config.shell_runner().program(), "bash");
        assert!(!config.resolution.strict);
        assert_eq!(config.sources, SourcesConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        fs::write(&path, "[resolution]\nshell = \"\"\n").await.unwrap();
        assert!(GlobalConfig::load_from(&path).await.is_err());

        fs::write(&path, "[sources]\nhttp_timeout_secs = 0\n").await.unwrap();
        assert!(GlobalConfig::load_from(&path).await.is_err());

        fs::write(&path, "[resolution]\nstrcit = true\n").await.unwrap();
        let err = GlobalConfig::load_from(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("strcit"));
    }

    #[test]
    fn test_resolve_context_mode() {
        let config = GlobalConfig::default();
        assert_eq!(config.resolve_context(false).mode, ResolutionMode::Lenient);
        assert_eq!(config.resolve_context(true).mode, ResolutionMode::Strict);

        let mut strict = GlobalConfig::default();
        strict.resolution.strict = true;
        assert_eq!(strict.resolve_context(false).mode, ResolutionMode::Strict);
    }

    #[test]
    fn test_default_path_is_under_home() {
        let path = GlobalConfig::default_path().unwrap();
        assert!(path.ends_with(".stackyard/config.toml"));
    }
}
