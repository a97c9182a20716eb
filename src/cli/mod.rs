//! Command-line interface for Stackyard.
//!
//! ```text
//! stackyard [-v|-q] [--config PATH] <COMMAND>
//!
//!   plan      --manifest SRC [--env E] [--start UNIT] [--strict] [--format text|json]
//!   validate  --manifest SRC [--env E] [--format text|json]
//!   config    init [--force] | show | path
//! ```
//!
//! `SRC` is a local path, an `http(s)://` URL or `git+<repository>//<path>[?ref=<rev>]`.
//! Logs go to stderr; `RUST_LOG` takes precedence over `--verbose` / `--quiet`.

mod config;
mod plan;
mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;
use crate::source::ManifestSource;

pub use config::ConfigCommand;
pub use plan::PlanCommand;
pub use validate::ValidateCommand;

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Explicit configuration file (`--config` / `STACKYARD_CONFIG`).
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the stderr subscriber. Does nothing if one is already installed.
    pub fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(&self.log_level)
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    pub async fn load_global_config(&self) -> Result<GlobalConfig> {
        GlobalConfig::load_with_optional(self.config_path.clone()).await
    }
}

#[derive(Parser)]
#[command(
    name = "stackyard",
    about = "Order and resolve infrastructure stacks from a YAML manifest",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logs
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global configuration file
    #[arg(short, long, global = true, env = "STACKYARD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the deployment order and resolved parameters of an environment
    Plan(PlanCommand),

    /// Check a manifest for unknown references and dependency problems
    Validate(ValidateCommand),

    /// Manage the global configuration file
    Config(ConfigCommand),
}

/// Output format shared by `plan` and `validate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level: log_level.to_string(),
            config_path: self.config.clone(),
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Plan(cmd) => cmd.execute(&config).await,
            Commands::Validate(cmd) => cmd.execute(&config).await,
            Commands::Config(cmd) => cmd.execute(&config).await,
        }
    }
}

/// Parse `--manifest` for clap.
fn parse_manifest_source(location: &str) -> Result<ManifestSource, String> {
    location.parse().map_err(|e: anyhow::Error| format!("{e:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_levels() {
        let cli = Cli::parse_from(["stackyard", "-v", "config", "path"]);
        assert_eq!(cli.build_config().log_level, "debug");

        let cli = Cli::parse_from(["stackyard", "config", "path", "--quiet"]);
        assert_eq!(cli.build_config().log_level, "error");

        let cli = Cli::parse_from(["stackyard", "config", "path"]);
        assert_eq!(cli.build_config().log_level, "warn");
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["stackyard", "-v", "-q", "config", "path"]).is_err());
    }

    #[test]
    fn test_plan_arguments() {
        let cli = Cli::parse_from([
            "stackyard",
            "plan",
            "--manifest",
            "git+https://example.com/stacks.git//web.yaml",
            "--env",
            "prod",
            "--start",
            "app",
            "--format",
            "json",
        ]);
        let Commands::Plan(plan) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(plan.env.as_deref(), Some("prod"));
        assert_eq!(plan.start.as_deref(), Some("app"));
        assert_eq!(plan.format, OutputFormat::Json);
        assert!(matches!(plan.manifest, ManifestSource::Git { .. }));
    }

    #[test]
    fn test_bad_manifest_location_rejected() {
        assert!(Cli::try_parse_from(["stackyard", "plan", "--manifest", "git+nowhere"]).is_err());
    }
}
