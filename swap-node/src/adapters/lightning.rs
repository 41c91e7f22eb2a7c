//! `LocalLightningAdapter`: an in-memory stand-in for an LND/CLN-backed
//! Lightning node client. HODL invoices are tracked by payment hash;
//! route probes and payouts return a fixed confidence/fee rather than
//! consulting a real routing graph.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::Digest;
use tokio::sync::Mutex;

use swap_core::error::{CoreError, LightningError};
use swap_core::lightning::{InvoiceStatus, LightningAdapter, PaymentOutcome, ProbeResult, RoutingBounds};

struct HodlInvoice {
    status: InvoiceStatus,
    bolt11: String,
}

pub struct LocalLightningAdapter {
    invoices: Mutex<HashMap<[u8; 32], HodlInvoice>>,
    default_confidence: f64,
}

impl LocalLightningAdapter {
    pub fn new(default_confidence: f64) -> Self {
        Self {
            invoices: Mutex::new(HashMap::new()),
            default_confidence,
        }
    }

    /// Test hook: mark a previously-created HODL invoice as accepted,
    /// simulating an incoming HTLC landing before settlement (§4.3).
    pub async fn mark_accepted(&self, payment_hash: [u8; 32]) {
        if let Some(inv) = self.invoices.lock().await.get_mut(&payment_hash) {
            inv.status = InvoiceStatus::Accepted;
        }
    }
}

#[async_trait]
impl LightningAdapter for LocalLightningAdapter {
    async fn create_hodl_invoice(
        &self,
        payment_hash: [u8; 32],
        amount_msat: u64,
        expiry_secs: u32,
        _description: &str,
    ) -> Result<String, CoreError> {
        let bolt11 = format!(
            "lnbc{}n-{}-{}",
            amount_msat / 1000,
            hex::encode(&payment_hash[..8]),
            expiry_secs
        );
        self.invoices.lock().await.insert(
            payment_hash,
            HodlInvoice {
                status: InvoiceStatus::Created,
                bolt11: bolt11.clone(),
            },
        );
        Ok(bolt11)
    }

    async fn invoice_status(&self, payment_hash: [u8; 32]) -> Result<InvoiceStatus, CoreError> {
        self.invoices
            .lock()
            .await
            .get(&payment_hash)
            .map(|inv| inv.status)
            .ok_or_else(|| CoreError::Lightning(LightningError::InvoiceDecode("unknown invoice".into())))
    }

    async fn settle_hodl_invoice(&self, payment_hash: [u8; 32], _preimage: [u8; 32]) -> Result<(), CoreError> {
        let mut invoices = self.invoices.lock().await;
        match invoices.get_mut(&payment_hash) {
            Some(inv) if inv.status == InvoiceStatus::Settled => {
                Err(CoreError::Lightning(LightningError::AlreadySettled))
            }
            Some(inv) => {
                inv.status = InvoiceStatus::Settled;
                Ok(())
            }
            None => Err(CoreError::Lightning(LightningError::InvoiceDecode("unknown invoice".into()))),
        }
    }

    async fn cancel_hodl_invoice(&self, payment_hash: [u8; 32]) -> Result<(), CoreError> {
        if let Some(inv) = self.invoices.lock().await.get_mut(&payment_hash) {
            inv.status = InvoiceStatus::Canceled;
        }
        Ok(())
    }

    async fn probe_route(&self, _bolt11: &str, amount_msat: u64) -> Result<ProbeResult, CoreError> {
        Ok(ProbeResult {
            confidence: self.default_confidence,
            fee_sats: (amount_msat / 1000 / 1000).max(1) as u128,
        })
    }

    async fn pay_invoice(&self, bolt11: &str, bounds: RoutingBounds) -> Result<PaymentOutcome, CoreError> {
        if bounds.max_routing_base_fee_sats == 0 {
            return Ok(PaymentOutcome::Failed {
                permanent: true,
                reason: "routing fee bound is zero".into(),
            });
        }
        let mut preimage = [0u8; 32];
        preimage.copy_from_slice(&sha2::Sha256::digest(bolt11.as_bytes()));
        Ok(PaymentOutcome::Succeeded {
            preimage,
            fee_sats: 1,
        })
    }
}
