//! Atomic swap CLI commands: one subcommand per direction's quote
//! endpoint, plus `status` and `info`.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::*;
use uuid::Uuid;

use crate::config::Config;
use crate::rpc::{
    require_code_ok, CreateInvoiceRequest, GetAddressRequest, NodeClient, PayInvoiceRequest,
    ToBtcGetAddressRequest, TrustedCreateInvoiceRequest,
};

#[derive(Debug, Args)]
pub struct SwapCmd {
    #[command(subcommand)]
    pub command: SwapCommand,
}

#[derive(Debug, Subcommand)]
pub enum SwapCommand {
    /// Quote a Bitcoin-on-chain deposit (from-btc-onchain)
    FromBtc(FromBtcArgs),
    /// Create a HODL invoice for a Lightning deposit (from-btc-lightning)
    FromBtcLn(FromBtcLnArgs),
    /// Quote a Bitcoin-on-chain payout (to-btc-onchain)
    ToBtc(ToBtcArgs),
    /// Pay a Lightning invoice (to-btc-lightning)
    ToBtcLn(ToBtcLnArgs),
    /// Create a trusted custodial Lightning deposit invoice
    TrustedFromBtcLn(TrustedFromBtcLnArgs),
    /// Check the status of a previously quoted swap
    Status(StatusArgs),
    /// Fetch and display the intermediary's signed service info
    Info,
}

#[derive(Debug, Args)]
pub struct FromBtcArgs {
    /// Destination address on the SC chain
    #[arg(long)]
    pub address: String,
    /// Amount, in satoshis unless --exact-out is set (then token units)
    #[arg(long)]
    pub amount: String,
    /// Interpret `amount` as the exact output instead of exact input
    #[arg(long)]
    pub exact_out: bool,
    /// Token to receive on the SC chain
    #[arg(long)]
    pub token: String,
    /// Caller-chosen payment hash (hex, 32 bytes); a fresh one is generated if omitted
    #[arg(long)]
    pub payment_hash: Option<String>,
    /// scriptPubKey of `address`, hex-encoded
    #[arg(long)]
    pub script_pubkey: String,
    /// Bitcoin address refunded net of fee on a gross overpay
    #[arg(long)]
    pub refund_address: Option<String>,
}

#[derive(Debug, Args)]
pub struct FromBtcLnArgs {
    #[arg(long)]
    pub amount: String,
    #[arg(long)]
    pub exact_out: bool,
    #[arg(long)]
    pub token: String,
    #[arg(long)]
    pub payment_hash: Option<String>,
}

#[derive(Debug, Args)]
pub struct ToBtcArgs {
    #[arg(long)]
    pub amount: String,
    #[arg(long)]
    pub exact_out: bool,
    #[arg(long)]
    pub token: String,
    #[arg(long)]
    pub payment_hash: Option<String>,
    /// Bitcoin address the LP should pay out to
    #[arg(long)]
    pub destination_address: String,
    /// scriptPubKey of `destination_address`, hex-encoded
    #[arg(long)]
    pub script_pubkey: String,
}

#[derive(Debug, Args)]
pub struct ToBtcLnArgs {
    #[arg(long)]
    pub bolt11: String,
    #[arg(long)]
    pub amount_msat: u64,
    #[arg(long)]
    pub token: String,
    #[arg(long)]
    pub payment_hash: Option<String>,
}

#[derive(Debug, Args)]
pub struct TrustedFromBtcLnArgs {
    #[arg(long)]
    pub amount: String,
    #[arg(long)]
    pub token: String,
    #[arg(long)]
    pub payment_hash: Option<String>,
    #[arg(long)]
    pub refund_address: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Direction the swap was quoted on
    #[arg(long, value_parser = ["from-btc-onchain", "from-btc-lightning", "to-btc-onchain", "to-btc-lightning", "trusted-from-btc-lightning"])]
    pub direction: String,
    /// Payment hash, hex-encoded
    pub payment_hash: String,
}

fn fresh_payment_hash() -> String {
    let mut bytes = [0u8; 32];
    let uuid_bytes = Uuid::new_v4().into_bytes();
    bytes[..16].copy_from_slice(&uuid_bytes);
    bytes[16..].copy_from_slice(&uuid_bytes);
    hex::encode(bytes)
}

pub async fn execute(cmd: SwapCmd, config: &Config) -> Result<()> {
    let client = NodeClient::new(config.node_url.clone(), config.timeout)?;
    match cmd.command {
        SwapCommand::FromBtc(args) => from_btc(args, &client).await,
        SwapCommand::FromBtcLn(args) => from_btc_ln(args, &client).await,
        SwapCommand::ToBtc(args) => to_btc(args, &client).await,
        SwapCommand::ToBtcLn(args) => to_btc_ln(args, &client).await,
        SwapCommand::TrustedFromBtcLn(args) => trusted_from_btc_ln(args, &client).await,
        SwapCommand::Status(args) => status(args, &client).await,
        SwapCommand::Info => info(&client).await,
    }
}

async fn from_btc(args: FromBtcArgs, client: &NodeClient) -> Result<()> {
    let payment_hash = args.payment_hash.unwrap_or_else(fresh_payment_hash);
    println!("{}", "Requesting Bitcoin deposit address...".yellow());
    let response = client
        .from_btc_get_address(&GetAddressRequest {
            address: &args.address,
            amount: args.amount,
            exact_out: args.exact_out,
            token: &args.token,
            payment_hash: &payment_hash,
            script_pubkey: &args.script_pubkey,
            refund_address: args.refund_address.as_deref(),
        })
        .await?;
    print_quote(&response, &payment_hash);
    Ok(())
}

async fn from_btc_ln(args: FromBtcLnArgs, client: &NodeClient) -> Result<()> {
    let payment_hash = args.payment_hash.unwrap_or_else(fresh_payment_hash);
    println!("{}", "Requesting Lightning deposit invoice...".yellow());
    let response = client
        .from_btc_ln_create_invoice(&CreateInvoiceRequest {
            payment_hash: &payment_hash,
            amount: args.amount,
            exact_out: args.exact_out,
            token: &args.token,
        })
        .await?;
    print_quote(&response, &payment_hash);
    Ok(())
}

async fn to_btc(args: ToBtcArgs, client: &NodeClient) -> Result<()> {
    let payment_hash = args.payment_hash.unwrap_or_else(fresh_payment_hash);
    println!("{}", "Requesting Bitcoin payout quote...".yellow());
    let response = client
        .to_btc_get_address(&ToBtcGetAddressRequest {
            payment_hash: &payment_hash,
            amount: args.amount,
            exact_out: args.exact_out,
            token: &args.token,
            destination_address: &args.destination_address,
            script_pubkey: &args.script_pubkey,
        })
        .await?;
    print_quote(&response, &payment_hash);
    Ok(())
}

async fn to_btc_ln(args: ToBtcLnArgs, client: &NodeClient) -> Result<()> {
    let payment_hash = args.payment_hash.unwrap_or_else(fresh_payment_hash);
    println!("{}", "Requesting Lightning payout quote...".yellow());
    let response = client
        .to_btc_ln_pay_invoice(&PayInvoiceRequest {
            payment_hash: &payment_hash,
            bolt11: &args.bolt11,
            amount_msat: args.amount_msat,
            token: &args.token,
        })
        .await?;
    print_quote(&response, &payment_hash);
    Ok(())
}

async fn trusted_from_btc_ln(args: TrustedFromBtcLnArgs, client: &NodeClient) -> Result<()> {
    let payment_hash = args.payment_hash.unwrap_or_else(fresh_payment_hash);
    println!("{}", "Requesting trusted Lightning deposit invoice...".yellow());
    let response = client
        .trusted_from_btc_ln_create_invoice(&TrustedCreateInvoiceRequest {
            payment_hash: &payment_hash,
            amount: args.amount,
            token: &args.token,
            refund_address: args.refund_address.as_deref(),
        })
        .await?;
    print_quote(&response, &payment_hash);
    Ok(())
}

async fn status(args: StatusArgs, client: &NodeClient) -> Result<()> {
    let response = client.invoice_status(&args.direction, &args.payment_hash).await?;
    let label = match response.code {
        10000 => response.msg.green(),
        20000..=29999 => response.msg.red(),
        _ => response.msg.yellow(),
    };
    println!("{} {} {}", "Status:".bold(), label, format!("(code {})", response.code).dimmed());
    Ok(())
}

async fn info(client: &NodeClient) -> Result<()> {
    let nonce = fresh_payment_hash();
    let response = client.info(&nonce).await?;
    println!("{}", "Intermediary info:".bold());
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn print_quote(response: &crate::rpc::QuoteResponse, payment_hash: &str) {
    if require_code_ok(response.code, &response.msg).is_err() {
        println!("{} {}", "✗ Quote rejected:".red(), response.msg);
        return;
    }
    println!("{}", "✓ Quote issued".green());
    println!("  Payment hash: {}", payment_hash.cyan());
    println!("{}", serde_json::to_string_pretty(&response.data).unwrap_or_default());
}
