//! `LocalSwapContract`: an in-memory stand-in for the SC-chain RPC
//! capability. Tracks escrow records and signs authorizations with the
//! node's own `IdentityService` key rather than a real SC-chain wallet.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use swap_core::chain_adapter::{ChainEvent, SpvProof, SwapContract};
use swap_core::error::{ChainAdapterError, CoreError};
use swap_core::identity::IdentityService;
use swap_core::types::{PaymentHash, SwapData, SwapDataType};

pub struct LocalSwapContract {
    identity: Arc<IdentityService>,
    escrows: DashMap<[u8; 32], SwapData>,
    subscribers: Mutex<Vec<mpsc::Sender<ChainEvent>>>,
}

impl LocalSwapContract {
    pub fn new(identity: Arc<IdentityService>) -> Self {
        Self {
            identity,
            escrows: DashMap::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    async fn publish(&self, event: ChainEvent) {
        let subs = self.subscribers.lock().await;
        for sub in subs.iter() {
            let _ = sub.send(event.clone()).await;
        }
    }
}

#[async_trait]
impl SwapContract for LocalSwapContract {
    async fn create_swap_data(
        &self,
        payment_hash: PaymentHash,
        offerer: &str,
        claimer: &str,
        token: &str,
        amount: u128,
        expiry: u64,
    ) -> Result<SwapData, CoreError> {
        let data = SwapData {
            offerer: offerer.to_string(),
            claimer: claimer.to_string(),
            token: token.to_string(),
            amount,
            hash: payment_hash.0,
            expiry,
            confirmations: 1,
            sequence: 0,
            security_deposit: 0,
            claimer_bounty: 0,
            swap_type: SwapDataType::Htlc,
            pay_in: false,
        };
        self.escrows.insert(payment_hash.0, data.clone());
        Ok(data)
    }

    async fn sign_init_authorization(&self, swap_data: &SwapData) -> Result<String, CoreError> {
        self.identity
            .sign_envelope(swap_data)
            .map_err(|e| CoreError::ChainAdapter(ChainAdapterError::Rpc(e.to_string())))
    }

    async fn sign_refund_authorization(&self, payment_hash: PaymentHash) -> Result<String, CoreError> {
        self.identity
            .sign_envelope(&hex::encode(payment_hash.0))
            .map_err(|e| CoreError::ChainAdapter(ChainAdapterError::Rpc(e.to_string())))
    }

    async fn commit_status(&self, _tx_id: &str) -> Result<bool, CoreError> {
        Ok(true)
    }

    async fn claim(
        &self,
        payment_hash: PaymentHash,
        _proof: Option<SpvProof>,
        secret: Option<[u8; 32]>,
    ) -> Result<String, CoreError> {
        let tx_id = format!("claim-{}", payment_hash.to_hex());
        self.publish(ChainEvent::Claim {
            payment_hash,
            secret,
            tx_id: tx_id.clone(),
            block_height: 0,
        })
        .await;
        Ok(tx_id)
    }

    async fn refund(&self, payment_hash: PaymentHash) -> Result<String, CoreError> {
        let tx_id = format!("refund-{}", payment_hash.to_hex());
        self.publish(ChainEvent::Refund {
            payment_hash,
            tx_id: tx_id.clone(),
            block_height: 0,
        })
        .await;
        Ok(tx_id)
    }

    async fn synchronize_btc_relay(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ChainEvent>, CoreError> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().await.push(tx);
        Ok(rx)
    }
}
