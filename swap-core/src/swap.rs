//! The `Swap` tagged enum: one variant per direction, each carrying the
//! common [`SwapBase`] envelope plus its direction-specific extension and
//! state. This replaces the source's runtime `new Type(obj)` dispatch with
//! a typed enum matched exhaustively at compile time (§9 design note).

use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::state::{
    check_transition, FromBtcLnState, FromBtcState, SwapState, ToBtcLnState, ToBtcState,
    TrustedFromBtcLnState,
};
use crate::types::{Amount, Direction, PaymentHash, RefundReason, SwapBase};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FromBtcSwap {
    pub base: SwapBase,
    pub state: FromBtcState,
    pub btc_address: String,
    pub amount_sats: Amount,
    pub txo_hash: [u8; 32],
    /// scriptPubKey of `btc_address`, kept for the underpay/overpay
    /// script-only matching fallback (§4.2 scenarios 2/3).
    pub script_pubkey: Vec<u8>,
    pub confirmations_required: u32,
    pub observed_tx_id: Option<String>,
    pub observed_vout: Option<u32>,
    pub adjusted_input: Option<Amount>,
    pub adjusted_output: Option<Amount>,
    /// Where a gross overpay is refunded net of fee; `None` forfeits the
    /// excess (no destination to send it to).
    pub refund_address: Option<String>,
    pub refund_reason: Option<RefundReason>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FromBtcLnSwap {
    pub base: SwapBase,
    pub state: FromBtcLnState,
    pub bolt11: String,
    pub payment_secret: Option<String>,
    pub lnurl_withdraw: Option<String>,
    pub lnurl_pay: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToBtcSwap {
    pub base: SwapBase,
    pub state: ToBtcState,
    pub destination_address: String,
    pub amount_sats: Amount,
    /// scriptPubKey of `destination_address` and the nonce folded into
    /// `base.swap_data.hash` (§4.4's hash-binding rule), kept so the
    /// payout driver can reconstruct what the SC escrow is bound to.
    pub script_pubkey: Vec<u8>,
    pub nonce: u64,
    pub confirmation_target: u32,
    pub sats_per_vbyte: u64,
    pub observed_btc_tx_id: Option<String>,
    /// The LP's cooperative refund signature (§4.5), handed to the user
    /// so they can self-refund without waiting out the full time-lock if
    /// the LP never sends the Bitcoin payout.
    pub refund_authorization: Option<String>,
    pub refund_reason: Option<RefundReason>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToBtcLnSwap {
    pub base: SwapBase,
    pub state: ToBtcLnState,
    pub bolt11: String,
    pub confidence: f64,
    pub routing_fee_sats_max: Amount,
    pub preimage: Option<String>,
    /// The LP's cooperative refund signature (§4.5), mirroring
    /// `ToBtcSwap::refund_authorization`.
    pub refund_authorization: Option<String>,
    pub refund_reason: Option<RefundReason>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrustedFromBtcLnSwap {
    pub base: SwapBase,
    pub state: TrustedFromBtcLnState,
    pub input_sats: Amount,
    pub output_tokens: Amount,
    pub recommended_fee: Amount,
    pub refund_address: Option<String>,
    pub adjusted_input: Option<Amount>,
    pub adjusted_output: Option<Amount>,
    pub refund_reason: Option<RefundReason>,
    pub burn_tx: Option<String>,
}

/// The tagged union over every direction's swap record. `#[serde(tag =
/// "direction")]` keeps the on-disk JSON shape stable and human-readable.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "direction")]
pub enum Swap {
    #[serde(rename = "from_btc")]
    FromBtc(FromBtcSwap),
    #[serde(rename = "from_btc_ln")]
    FromBtcLn(FromBtcLnSwap),
    #[serde(rename = "to_btc")]
    ToBtc(ToBtcSwap),
    #[serde(rename = "to_btc_ln")]
    ToBtcLn(ToBtcLnSwap),
    #[serde(rename = "trusted_from_btc_ln")]
    TrustedFromBtcLn(TrustedFromBtcLnSwap),
}

impl Swap {
    pub fn base(&self) -> &SwapBase {
        match self {
            Swap::FromBtc(s) => &s.base,
            Swap::FromBtcLn(s) => &s.base,
            Swap::ToBtc(s) => &s.base,
            Swap::ToBtcLn(s) => &s.base,
            Swap::TrustedFromBtcLn(s) => &s.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut SwapBase {
        match self {
            Swap::FromBtc(s) => &mut s.base,
            Swap::FromBtcLn(s) => &mut s.base,
            Swap::ToBtc(s) => &mut s.base,
            Swap::ToBtcLn(s) => &mut s.base,
            Swap::TrustedFromBtcLn(s) => &mut s.base,
        }
    }

    pub fn payment_hash(&self) -> PaymentHash {
        self.base().payment_hash
    }

    pub fn direction(&self) -> Direction {
        self.base().direction
    }

    /// Whether the swap has reached a state that can no longer be mutated
    /// (I4). Terminal here means "finished" in the spec's sense, including
    /// the states still awaiting eviction grace.
    pub fn is_terminal(&self) -> bool {
        match self {
            Swap::FromBtc(s) => s.state.is_terminal(),
            Swap::FromBtcLn(s) => s.state.is_terminal(),
            Swap::ToBtc(s) => s.state.is_terminal(),
            Swap::ToBtcLn(s) => s.state.is_terminal(),
            Swap::TrustedFromBtcLn(s) => s.state.is_terminal(),
        }
    }

    pub fn state_label(&self) -> String {
        match self {
            Swap::FromBtc(s) => format!("{:?}", s.state),
            Swap::FromBtcLn(s) => format!("{:?}", s.state),
            Swap::ToBtc(s) => format!("{:?}", s.state),
            Swap::ToBtcLn(s) => format!("{:?}", s.state),
            Swap::TrustedFromBtcLn(s) => format!("{:?}", s.state),
        }
    }
}

/// Apply a validated state transition, rejecting anything not present in
/// the direction's transition table (P1). Terminal swaps refuse every
/// transition outright (I4), even a no-op replay.
macro_rules! impl_transition {
    ($fn_name:ident, $variant:ident, $state_ty:ty) => {
        pub fn $fn_name(swap: &mut Swap, to: $state_ty) -> Result<(), StateError> {
            match swap {
                Swap::$variant(inner) => {
                    if inner.state.is_terminal() {
                        return Err(StateError::Terminal(swap.payment_hash().to_hex()));
                    }
                    if !check_transition(inner.state, to) {
                        return Err(StateError::IllegalTransition {
                            direction: swap.direction(),
                            from: format!("{:?}", inner.state),
                            to: format!("{:?}", to),
                        });
                    }
                    inner.state = to;
                    Ok(())
                }
                _ => Err(StateError::IllegalTransition {
                    direction: swap.direction(),
                    from: "<wrong-variant>".to_string(),
                    to: format!("{:?}", to),
                }),
            }
        }
    };
}

impl_transition!(transition_from_btc, FromBtc, FromBtcState);
impl_transition!(transition_from_btc_ln, FromBtcLn, FromBtcLnState);
impl_transition!(transition_to_btc, ToBtc, ToBtcState);
impl_transition!(transition_to_btc_ln, ToBtcLn, ToBtcLnState);
impl_transition!(
    transition_trusted_from_btc_ln,
    TrustedFromBtcLn,
    TrustedFromBtcLnState
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PriceInfo, SignedQuote, SwapData, SwapDataType, TxIds, Metadata};

    fn base(direction: Direction) -> SwapBase {
        SwapBase {
            payment_hash: PaymentHash([7u8; 32]),
            direction,
            chain_id: "test-1".into(),
            swap_data: SwapData {
                offerer: "offerer".into(),
                claimer: "claimer".into(),
                token: "TOK".into(),
                amount: 1_000,
                hash: [0u8; 32],
                expiry: 0,
                confirmations: 1,
                sequence: 0,
                security_deposit: 0,
                claimer_bounty: 0,
                swap_type: SwapDataType::Htlc,
                pay_in: false,
            },
            swap_fee: 10,
            swap_fee_btc: 1,
            network_fee: None,
            price_info: PriceInfo {
                base_fee_sats: 1,
                fee_ppm: 1000,
                swap_price_micro_sat_per_token: 1,
            },
            signed_quote: SignedQuote {
                prefix: "swap".into(),
                timeout: 0,
                signature: "sig".into(),
                fee_rate: None,
            },
            tx_ids: TxIds::default(),
            metadata: Metadata::default(),
            created_at: 0,
            expires_at: 0,
        }
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut swap = Swap::FromBtc(FromBtcSwap {
            base: base(Direction::FromBtc),
            state: FromBtcState::Created,
            btc_address: "addr".into(),
            amount_sats: 1000,
            txo_hash: [0u8; 32],
            script_pubkey: vec![0u8; 22],
            confirmations_required: 1,
            observed_tx_id: None,
            observed_vout: None,
            adjusted_input: None,
            adjusted_output: None,
            refund_address: None,
            refund_reason: None,
        });
        let err = transition_from_btc(&mut swap, FromBtcState::Claimed).unwrap_err();
        assert!(matches!(err, StateError::IllegalTransition { .. }));
    }

    #[test]
    fn terminal_swap_rejects_further_mutation() {
        let mut swap = Swap::ToBtcLn(ToBtcLnSwap {
            base: base(Direction::ToBtcLn),
            state: ToBtcLnState::Claimed,
            bolt11: "lnbc1".into(),
            confidence: 0.9,
            routing_fee_sats_max: 10,
            preimage: Some("ff".into()),
            refund_authorization: None,
            refund_reason: None,
        });
        let err = transition_to_btc_ln(&mut swap, ToBtcLnState::Claimed).unwrap_err();
        assert!(matches!(err, StateError::Terminal(_)));
    }

    #[test]
    fn idempotent_replay_of_same_state_succeeds() {
        let mut swap = Swap::ToBtc(ToBtcSwap {
            base: base(Direction::ToBtc),
            state: ToBtcState::Commited,
            destination_address: "bc1q".into(),
            amount_sats: 1000,
            script_pubkey: vec![0u8; 22],
            nonce: 0,
            confirmation_target: 6,
            sats_per_vbyte: 5,
            observed_btc_tx_id: None,
            refund_authorization: None,
            refund_reason: None,
        });
        transition_to_btc(&mut swap, ToBtcState::Commited).unwrap();
    }
}
