//! `stackyard plan`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::{CliConfig, OutputFormat, parse_manifest_source};
use crate::planner::{Plan, Planner};
use crate::source::ManifestSource;

#[derive(Args)]
pub struct PlanCommand {
    /// Manifest location: path, http(s) URL or git+<repository>//<path>[?ref=<rev>]
    #[arg(short, long, value_parser = parse_manifest_source)]
    pub(super) manifest: ManifestSource,

    /// Environment to plan (optional when the manifest names at most one)
    #[arg(short, long)]
    pub(super) env: Option<String>,

    /// Only plan what this unit needs
    #[arg(short, long)]
    pub(super) start: Option<String>,

    /// Fail on shell commands and functions that error
    #[arg(long)]
    pub(super) strict: bool,

    #[arg(short, long, value_enum, default_value_t)]
    pub(super) format: OutputFormat,
}

impl PlanCommand {
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let global = config.load_global_config().await?;
        let manifest = self.manifest.load(&global.source_settings()).await?;

        let planner =
            Planner::load(manifest, self.env.as_deref(), global.resolve_context(self.strict))
                .await
                .with_context(|| format!("Failed to load manifest {}", self.manifest))?;

        let plan = planner
            .plan(self.start.as_deref())
            .await
            .with_context(|| format!("Failed to plan environment '{}'", planner.environment()))?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            OutputFormat::Text => print!("{}", render_text(&plan)),
        }
        Ok(())
    }
}

fn render_text(plan: &Plan) -> String {
    let mut out = format!(
        "{} {} ({} unit{})\n",
        "Plan for".bold(),
        plan.environment.cyan().bold(),
        plan.units.len(),
        if plan.units.len() == 1 { "" } else { "s" }
    );

    if plan.units.is_empty() {
        out.push_str("  nothing to deploy\n");
        return out;
    }

    for (position, unit) in plan.units.iter().enumerate() {
        out.push_str(&format!(
            "\n{:>3}. {} {}\n",
            position + 1,
            unit.name.green().bold(),
            format!("[{}]", unit.project).dimmed()
        ));
        if let Some(template) = &unit.template {
            out.push_str(&format!("     template:   {template}\n"));
        }
        if let Some(account) = &unit.account {
            let id = account.fields.get("id").map(String::as_str).unwrap_or_default();
            out.push_str(&format!("     account:    {} ({})\n", account.name, id));
        }
        if !unit.depends_on.is_empty() {
            out.push_str(&format!("     depends on: {}\n", unit.depends_on.join(", ")));
        }
        for (name, value) in &unit.parameters {
            out.push_str(&format!("     {} = {}\n", name.yellow(), value));
        }
    }
    out
}
