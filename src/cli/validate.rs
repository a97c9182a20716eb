//! `stackyard validate`

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use super::{CliConfig, OutputFormat, parse_manifest_source};
use crate::planner::{Planner, ValidationReport};
use crate::source::ManifestSource;

#[derive(Args)]
pub struct ValidateCommand {
    /// Manifest location: path, http(s) URL or git+<repository>//<path>[?ref=<rev>]
    #[arg(short, long, value_parser = parse_manifest_source)]
    pub(super) manifest: ManifestSource,

    /// Environment to check (optional when the manifest names at most one)
    #[arg(short, long)]
    pub(super) env: Option<String>,

    #[arg(short, long, value_enum, default_value_t)]
    pub(super) format: OutputFormat,
}

impl ValidateCommand {
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let global = config.load_global_config().await?;
        let manifest = self.manifest.load(&global.source_settings()).await?;

        let planner = Planner::load(manifest, self.env.as_deref(), global.resolve_context(false))
            .await
            .with_context(|| format!("Failed to load manifest {}", self.manifest))?;
        let report = planner.validate();

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => print!("{}", render_text(&report)),
        }

        if !report.is_valid() {
            bail!(
                "Manifest {} has {} error(s) in '{}'",
                self.manifest,
                report.errors.len(),
                report.environment
            );
        }
        Ok(())
    }
}

fn render_text(report: &ValidationReport) -> String {
    let mut out = String::new();
    for error in &report.errors {
        out.push_str(&format!("{} {}\n", "error:".red().bold(), error));
    }
    for warning in &report.warnings {
        out.push_str(&format!("{} {}\n", "warning:".yellow().bold(), warning));
    }
    if report.is_valid() {
        out.push_str(&format!(
            "{} manifest is valid for '{}' ({} warning(s))\n",
            "✓".green(),
            report.environment,
            report.warnings.len()
        ));
    }
    out
}
