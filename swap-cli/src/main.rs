//! Command-line client for the atomic swap intermediary's REST surface.

mod commands;
mod config;
mod rpc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::swap::{self, SwapCmd};

#[derive(Parser)]
#[command(
    name = "swap-cli",
    version,
    about = "Client for an atomic swap intermediary node",
    long_about = "Command-line interface for quoting and tracking cross-chain atomic swaps against a swap-node instance"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the node's base URL
    #[arg(long, global = true, env = "SWAP_NODE_URL")]
    node_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote and track atomic swaps
    Swap(SwapCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .init();

    let mut config = config::Config::load()?;
    if let Some(node_url) = cli.node_url {
        config.node_url = node_url;
    }
    if cli.debug {
        config.debug = true;
    }

    match cli.command {
        Commands::Swap(cmd) => swap::execute(cmd, &config).await?,
    }

    Ok(())
}
