//! Start command implementation.

use crate::core::config::Config;
use crate::core::runtime::Runtime;
use anyhow::Result;
use clap::Args;

/// Start the serving node.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Disable background eviction for this run.
    #[arg(long)]
    pub no_eviction: bool,
}

/// Run the node until SIGINT.
pub async fn run_start(args: StartArgs, mut config: Config) -> Result<()> {
    super::init_tracing(&config.telemetry.log_level);

    if args.no_eviction {
        config.cache.eviction_enabled = false;
    }

    let mut runtime = Runtime::new(config)?;
    runtime.run().await
}
