//! Tessera - unified CLI entrypoint.
//!
//! Usage:
//!   tessera start --config config/tessera.toml
//!   tessera init --demo
//!   tessera load <collection> [-p TAG]...
//!   tessera release <collection> [-p TAG]...
//!   tessera describe <collection> [-p TAG]...
//!   tessera config validate|show

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tessera::cli::commands::{load_config, run_config, run_init, run_lifecycle, run_start};
use tessera::cli::{Cli, Commands};
use tessera::commands::CommandKind;
use tessera::config::ConfigOverrides;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.map(PathBuf::from);
    let overrides = ConfigOverrides {
        log_level: cli.log_level,
        storage_dir: cli.storage_dir,
        ..ConfigOverrides::default()
    };
    let config = load_config(config_path.as_deref(), &overrides)?;

    match cli.command {
        Commands::Start(args) => run_start(args, config).await,
        Commands::Load(args) => run_lifecycle(CommandKind::LoadCollection, args, config).await,
        Commands::Release(args) => {
            run_lifecycle(CommandKind::ReleaseCollection, args, config).await
        }
        Commands::Describe(args) => {
            run_lifecycle(CommandKind::DescribeResidency, args, config).await
        }
        Commands::Init(args) => run_init(args, &config),
        Commands::Config(args) => run_config(args, &config),
    }
}
