//! `stackyard config`

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use super::CliConfig;
use crate::config::GlobalConfig;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Write a configuration file with the default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration (the default)
    Show,

    /// Print the configuration file location
    Path,
}

impl ConfigCommand {
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let path = match &config.config_path {
            Some(path) => path.clone(),
            None => GlobalConfig::default_path()?,
        };

        match self.command.unwrap_or(ConfigSubcommands::Show) {
            ConfigSubcommands::Init {
                force,
            } => init(path, force).await,
            ConfigSubcommands::Show => show(config, path).await,
            ConfigSubcommands::Path => {
                println!("{}", path.display());
                Ok(())
            }
        }
    }
}

async fn init(path: PathBuf, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(&path).await.unwrap_or(false) {
        anyhow::bail!("Config already exists at {} (use --force to overwrite)", path.display());
    }

    GlobalConfig::default().save_to(&path).await?;
    println!("{} Created config at {}", "✓".green(), path.display());
    Ok(())
}

async fn show(config: &CliConfig, path: PathBuf) -> Result<()> {
    let global = config.load_global_config().await?;
    let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);

    println!("{} {}", "Location:".bold(), path.display());
    if !exists {
        println!("{}", "(file not found, showing defaults)".dimmed());
    }
    println!();
    print!("{}", global.to_toml()?);
    Ok(())
}
