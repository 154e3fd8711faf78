//! Load, release and describe command implementations.
//!
//! Each invocation starts an in-process node (storage, catalog, cache and
//! configured preloads), runs one lifecycle request against it, and prints
//! the outcome as JSON on stdout.

use crate::commands::{CommandKind, LifecycleRequest, RequestContext};
use crate::core::config::Config;
use crate::core::runtime::Runtime;
use anyhow::{Context, Result};
use clap::Args;

/// Arguments shared by the lifecycle commands.
#[derive(Args, Debug)]
pub struct LifecycleArgs {
    /// Root collection name.
    pub collection: String,

    /// Partition tag; repeat for several. Omit for the whole collection.
    #[arg(short = 'p', long = "partition")]
    pub partitions: Vec<String>,

    /// Pretty-print the JSON outcome.
    #[arg(long)]
    pub pretty: bool,
}

/// Run one lifecycle command. Fails when the outcome status is not OK.
pub async fn run_lifecycle(kind: CommandKind, args: LifecycleArgs, mut config: Config) -> Result<()> {
    super::init_tracing(&config.telemetry.log_level);
    config.cache.eviction_enabled = false;

    let mut runtime = Runtime::new(config)?;
    runtime.start().await?;

    let request = LifecycleRequest::new(kind, args.collection, args.partitions);
    let context = RequestContext::new().with_client("cli");
    let outcome = runtime.dispatch_with(request, context).await;
    runtime.stop().await?;
    let outcome = outcome?;

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&outcome)
    } else {
        serde_json::to_string(&outcome)
    }
    .context("failed to render outcome")?;
    println!("{rendered}");

    if !outcome.is_ok() {
        anyhow::bail!(
            "{} failed with {}: {}",
            kind,
            outcome.status.code.as_str(),
            outcome.status.message
        );
    }
    Ok(())
}
