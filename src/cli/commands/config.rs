//! Config command implementation.

use crate::core::config::Config;
use anyhow::Result;
use clap::{Args, Subcommand};

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration (file plus overrides).
    Validate,
    /// Print the effective configuration with defaults filled in.
    Show {
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// Run the config command against an already loaded configuration.
pub fn run_config(args: ConfigArgs, config: &Config) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => validate_config(config),
        ConfigCommand::Show { format } => show_config(config, &format),
    }
}

fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;
    println!("✓ Configuration is valid");

    let manifest = config.paths.catalog_manifest_path();
    if !manifest.exists() {
        println!(
            "  ⚠ Warning: catalog manifest {} not found; the node starts with an empty catalog",
            manifest.display()
        );
    }
    if !config.cache.eviction_enabled {
        println!("  ⚠ Warning: background eviction is disabled");
    }
    Ok(())
}

fn show_config(config: &Config, format: &str) -> Result<()> {
    let rendered = render_config(config, format)?;
    println!("{rendered}");
    Ok(())
}

fn render_config(config: &Config, format: &str) -> Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(config)?),
        "toml" => config.to_toml(),
        other => anyhow::bail!("unknown format: {other} (expected toml or json)"),
    }
}
