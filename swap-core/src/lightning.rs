//! LightningAdapter: HODL invoice lifecycle, BOLT11 payment with routing
//! bounds, and route probing (§2, 8%; §4.3, §4.5).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Amount;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Created,
    Accepted,
    Settled,
    Canceled,
}

/// Bounds on the routing fee the LP is willing to pay when paying out a
/// BOLT11 invoice (§4.5).
#[derive(Clone, Copy, Debug)]
pub struct RoutingBounds {
    pub max_routing_base_fee_sats: Amount,
    pub max_routing_ppm: u64,
}

/// The result of a probe-before-commit call (§4.5): a confidence in
/// [0, 1] that a real payment would succeed, plus the fee the probe
/// observed along the best route.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ProbeResult {
    pub confidence: f64,
    pub fee_sats: Amount,
}

#[derive(Clone, Debug)]
pub enum PaymentOutcome {
    Succeeded { preimage: [u8; 32], fee_sats: Amount },
    Failed { permanent: bool, reason: String },
    Pending,
}

/// The abstract Lightning-node capability the engine depends on.
#[async_trait]
pub trait LightningAdapter: Send + Sync {
    /// Create a HODL invoice whose payment hash matches the SC-chain
    /// swap hash (§4.3); the incoming HTLC is accepted but held, not
    /// settled, until the engine observes the SC-chain `Claim`.
    async fn create_hodl_invoice(
        &self,
        payment_hash: [u8; 32],
        amount_msat: u64,
        expiry_secs: u32,
        description: &str,
    ) -> Result<String, CoreError>;

    /// Current status of a previously-created HODL invoice.
    async fn invoice_status(&self, payment_hash: [u8; 32]) -> Result<InvoiceStatus, CoreError>;

    /// Settle a held HODL invoice by revealing the preimage. Callers must
    /// only invoke this after observing the SC-chain `Claim` event (P5).
    async fn settle_hodl_invoice(
        &self,
        payment_hash: [u8; 32],
        preimage: [u8; 32],
    ) -> Result<(), CoreError>;

    /// Cancel a held HODL invoice, returning funds to the payer without
    /// risk to the LP (§4.3, expiry path).
    async fn cancel_hodl_invoice(&self, payment_hash: [u8; 32]) -> Result<(), CoreError>;

    /// Estimate the probability of success and fee for paying a BOLT11
    /// invoice, without committing funds (§4.5 probe-before-commit).
    async fn probe_route(&self, bolt11: &str, amount_msat: u64) -> Result<ProbeResult, CoreError>;

    /// Pay a BOLT11 invoice, respecting the routing fee bounds.
    async fn pay_invoice(
        &self,
        bolt11: &str,
        bounds: RoutingBounds,
    ) -> Result<PaymentOutcome, CoreError>;
}

/// Whether a probe result clears the LP's minimum confidence bar before a
/// quote is issued for a ToBtcLn swap.
pub fn probe_clears_threshold(probe: &ProbeResult, min_confidence: f64) -> bool {
    probe.confidence >= min_confidence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_threshold_gate() {
        let probe = ProbeResult {
            confidence: 0.42,
            fee_sats: 10,
        };
        assert!(!probe_clears_threshold(&probe, 0.5));
        assert!(probe_clears_threshold(&probe, 0.4));
    }
}
