//! xswap settlement node: entry point.
//!
//! Loads a TOML configuration, seeds an in-memory settlement chain and
//! replays inbound deposits through the swap engine.

mod config;
mod node;

use alloy_primitives::Address;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xswap_core::{AssetId, InboundDeposit};

use config::NodeConfig;
use node::SettlementNode;

/// xswap settlement node
#[derive(Parser, Debug)]
#[command(name = "xswap-node", version, about = "xswap settlement node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "xswap.toml")]
    config: PathBuf,

    /// JSON file holding an array of inbound deposits to replay.
    #[arg(short, long)]
    deposits: Option<PathBuf>,

    /// Fail every outbound delivery to exercise recovery.
    #[arg(long)]
    fail_deliveries: bool,

    /// Print the minimum input for withdrawing TARGET when paying with INPUT.
    #[arg(long, num_args = 2, value_names = ["INPUT", "TARGET"])]
    quote: Option<Vec<Address>>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    // Handle --init flag
    if args.init {
        NodeConfig::default().save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote default config");
        return Ok(());
    }

    tracing::info!("xswap node v{}", env!("CARGO_PKG_VERSION"));
    let node = SettlementNode::new(&config)?;

    if let Some(pair) = args.quote {
        if let [input, target] = pair.as_slice() {
            let min = node
                .quote_min_input(AssetId(*input), AssetId(*target))
                .await?;
            println!("{min}");
        }
    }

    let Some(path) = args.deposits else {
        return Ok(());
    };
    let deposits: Vec<InboundDeposit> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    tracing::info!(count = deposits.len(), path = %path.display(), "replaying deposits");

    let mut events = node.subscribe();
    let outcomes = node.replay(deposits, args.fail_deliveries).await?;
    for outcome in &outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    let mut published = 0usize;
    while events.try_recv().is_ok() {
        published += 1;
    }
    tracing::info!(
        deposits = outcomes.len(),
        events = published,
        outbound = node.chain().deliveries().len(),
        "replay finished"
    );
    Ok(())
}
