//! Atomic swap intermediary node binary.

mod adapters;
mod api;
mod config;
mod error;
mod logging;
mod metrics;
mod node;
mod storage;
mod watchdogs;

use clap::Parser;
use tracing::{error, info};

/// Command-line arguments, mirroring the teacher's node binary shape.
#[derive(Parser, Debug)]
#[command(author, version, about = "atomic swap intermediary node", long_about = None)]
struct Args {
    /// Configuration file path (looked up as `config.toml` relative to cwd)
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.debug);

    let node_config = config::NodeConfig::load_from(&args.config)?;
    info!(chain_id = %node_config.chain_id, "configuration loaded");

    match config::watch_config().await {
        Ok(mut reload_rx) => {
            tokio::spawn(async move {
                while reload_rx.recv().await.is_some() {
                    info!("config.toml changed on disk; restart the node to pick up changes");
                }
            });
        }
        Err(e) => error!(error = %e, "failed to start config file watcher, continuing without hot-reload"),
    }

    node::run(node_config).await?;
    Ok(())
}
