//! Request/response DTOs for the REST surface (§6). Field names match the
//! spec's camelCase wire format; internal `swap-core` types use `Amount =
//! u128`, stringified here per "all big-integer fields are stringified
//! decimal" (§6 persisted-state serialization rule, applied consistently
//! to the wire format too).

use serde::{Deserialize, Serialize};

use swap_core::quote::AmountSpec;
use swap_core::state::{FromBtcLnState, FromBtcState, ToBtcLnState, ToBtcState, TrustedFromBtcLnState};
use swap_core::swap::Swap;
use swap_core::types::{Amount, PaymentHash};

fn amount_str(a: Amount) -> String {
    a.to_string()
}

#[derive(Debug, Deserialize)]
pub struct GetAddressRequest {
    pub address: String,
    pub amount: String,
    #[serde(default)]
    pub exact_out: bool,
    pub token: String,
    pub payment_hash: String,
    /// Caller-supplied scriptPubKey hex; deriving this from `address` would
    /// require a Bitcoin address-decoding dependency out of scope here.
    pub script_pubkey: String,
    /// Bitcoin address refunded net of fee if the deposit overpays far
    /// beyond the quoted amount (§4.2 scenario 3).
    pub refund_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub payment_hash: String,
    pub amount: String,
    #[serde(default)]
    pub exact_out: bool,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct TrustedCreateInvoiceRequest {
    pub payment_hash: String,
    pub amount: String,
    pub token: String,
    pub refund_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToBtcGetAddressRequest {
    pub payment_hash: String,
    pub amount: String,
    #[serde(default)]
    pub exact_out: bool,
    pub token: String,
    pub destination_address: String,
    /// scriptPubKey of `destination_address`, hex-encoded; binds the
    /// SC-chain escrow to this specific payout (§4.4).
    pub script_pubkey: String,
}

#[derive(Debug, Deserialize)]
pub struct PayInvoiceRequest {
    pub payment_hash: String,
    pub bolt11: String,
    pub amount_msat: u64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceStatusQuery {
    #[serde(rename = "paymentHash")]
    pub payment_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    pub nonce: String,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub code: u32,
    pub msg: String,
    pub data: QuoteData,
}

#[derive(Debug, Serialize)]
pub struct QuoteData {
    pub payment_hash: String,
    pub amount: String,
    pub swap_fee: String,
    pub swap_fee_btc: String,
    pub total: String,
    pub expires_at: u64,
    pub prefix: String,
    pub timeout: u64,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bolt11: Option<String>,
}

impl QuoteResponse {
    pub fn from_swap(swap: &Swap, address: Option<String>, bolt11: Option<String>) -> Self {
        let base = swap.base();
        QuoteResponse {
            code: 10000,
            msg: "success".to_string(),
            data: QuoteData {
                payment_hash: base.payment_hash.to_hex(),
                amount: amount_str(base.swap_data.amount),
                swap_fee: amount_str(base.swap_fee),
                swap_fee_btc: amount_str(base.swap_fee_btc),
                total: amount_str(base.swap_data.amount.saturating_add(base.swap_fee)),
                expires_at: base.expires_at,
                prefix: base.signed_quote.prefix.clone(),
                timeout: base.signed_quote.timeout,
                signature: base.signed_quote.signature.clone(),
                address,
                bolt11,
            },
        }
    }
}

/// Numeric status codes for `GET /{dir}/getInvoiceStatus` (§6). Each
/// direction's state enum maps onto the shared code space; states with no
/// exact counterpart collapse onto the closest documented code.
pub fn status_code(swap: &Swap) -> u32 {
    match swap {
        Swap::FromBtc(s) => match s.state {
            FromBtcState::Created => 10010,
            FromBtcState::Commited => 10011,
            FromBtcState::BtcConfirmed => 10013,
            FromBtcState::Claimed => 10000,
            FromBtcState::Refundable => 10013,
            FromBtcState::Refunded => 10014,
            FromBtcState::Expired => 10001,
        },
        Swap::FromBtcLn(s) => match s.state {
            FromBtcLnState::PrCreated => 10010,
            FromBtcLnState::PrPaid => 10011,
            FromBtcLnState::ClaimCommited => 10012,
            FromBtcLnState::ClaimClaimed => 10000,
            FromBtcLnState::Failed => 10014,
            FromBtcLnState::QuoteExpired => 10001,
        },
        Swap::ToBtc(s) => match s.state {
            ToBtcState::Created => 10010,
            ToBtcState::Commited => 10011,
            ToBtcState::BtcSending => 10012,
            ToBtcState::BtcSent => 10013,
            ToBtcState::Claimed => 10000,
            ToBtcState::Refunded => 10014,
        },
        Swap::ToBtcLn(s) => match s.state {
            ToBtcLnState::Created => 10010,
            ToBtcLnState::Commited => 10011,
            ToBtcLnState::Paid => 10012,
            ToBtcLnState::Claimed => 10000,
            ToBtcLnState::Refunded => 10014,
        },
        Swap::TrustedFromBtcLn(s) => match s.state {
            TrustedFromBtcLnState::Created => 10010,
            TrustedFromBtcLnState::Received => 10011,
            TrustedFromBtcLnState::Sent => 10000,
            TrustedFromBtcLnState::Refunded => 10014,
            TrustedFromBtcLnState::DoubleSpent => 10015,
            TrustedFromBtcLnState::Failed => 10014,
        },
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceStatusResponse {
    pub code: u32,
    pub msg: String,
}

impl InvoiceStatusResponse {
    pub fn from_swap(swap: &Swap) -> Self {
        Self {
            code: status_code(swap),
            msg: swap.state_label(),
        }
    }
}

pub fn parse_payment_hash(hex_str: &str) -> Result<PaymentHash, crate::error::ApiError> {
    PaymentHash::from_hex(hex_str).map_err(|e| crate::error::ApiError::InvalidBody(e.to_string()))
}

pub fn parse_amount(s: &str) -> Result<Amount, crate::error::ApiError> {
    s.parse::<Amount>()
        .map_err(|e| crate::error::ApiError::InvalidBody(format!("invalid amount {s}: {e}")))
}

pub fn amount_spec(exact_out: bool) -> AmountSpec {
    if exact_out {
        AmountSpec::ExactOut
    } else {
        AmountSpec::ExactIn
    }
}
