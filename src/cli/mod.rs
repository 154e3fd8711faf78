//! Command-line interface.
//!
//! Unified CLI for Tessera operations.

pub mod commands;

use clap::{Parser, Subcommand};

/// Tessera - collection cache-lifecycle control for a segment-serving node.
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Storage directory override.
    #[arg(long, global = true)]
    pub storage_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the serving node and run until interrupted.
    Start(commands::StartArgs),
    /// Force-load a collection (or some of its partitions).
    Load(commands::LifecycleArgs),
    /// Force-release a collection (or some of its partitions).
    Release(commands::LifecycleArgs),
    /// Report cache residency for a collection.
    Describe(commands::LifecycleArgs),
    /// Initialize the storage layout.
    Init(commands::InitArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
}
