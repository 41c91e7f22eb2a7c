//! `LocalBitcoinWatcher`: an in-memory stand-in for a Bitcoin RPC client.
//! Addresses are "funded" by test harnesses or an operator console calling
//! [`LocalBitcoinWatcher::deposit`] directly; a real deployment replaces
//! this with a bitcoind/Electrum-backed implementation of the same trait.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::Digest;
use tokio::sync::Mutex;

use swap_core::bitcoin_watcher::{BitcoinWatcher, ObservedUtxo};
use swap_core::error::CoreError;

#[derive(Default)]
pub struct LocalBitcoinWatcher {
    watched: DashMap<String, Vec<ObservedUtxo>>,
    broadcast_log: Mutex<Vec<String>>,
    /// §9(c): the fee-rate multiplier applied over a flat base rate is a
    /// policy parameter, not derived; 1.25x mirrors the documented default.
    recommend_fee_multiplier: f64,
    /// Confirmation counts for our own payouts, keyed by tx id. Each poll
    /// of `tx_confirmations` advances the count by one, standing in for a
    /// block arriving.
    sent: DashMap<String, u32>,
    send_counter: AtomicU64,
}

impl LocalBitcoinWatcher {
    pub fn new() -> Self {
        Self {
            watched: DashMap::new(),
            broadcast_log: Mutex::new(Vec::new()),
            recommend_fee_multiplier: 1.25,
            sent: DashMap::new(),
            send_counter: AtomicU64::new(0),
        }
    }

    /// Test/operator hook: record a deposit as if observed on-chain.
    pub fn deposit(&self, address: &str, utxo: ObservedUtxo) {
        self.watched.entry(address.to_string()).or_default().push(utxo);
    }

    /// Test hook: simulate a transaction vanishing from the mempool
    /// (RBF replacement or reorg), exercising the double-spend watchdog.
    pub fn vanish(&self, address: &str, tx_id: &str) {
        if let Some(mut utxos) = self.watched.get_mut(address) {
            utxos.retain(|u| u.tx_id != tx_id);
        }
    }
}

#[async_trait]
impl BitcoinWatcher for LocalBitcoinWatcher {
    async fn watch_address(&self, address: &str) -> Result<(), CoreError> {
        self.watched.entry(address.to_string()).or_default();
        Ok(())
    }

    async fn unwatch_address(&self, address: &str) -> Result<(), CoreError> {
        self.watched.remove(address);
        Ok(())
    }

    async fn utxos_at(&self, address: &str) -> Result<Vec<ObservedUtxo>, CoreError> {
        Ok(self.watched.get(address).map(|v| v.clone()).unwrap_or_default())
    }

    async fn tx_still_present(&self, tx_id: &str) -> Result<bool, CoreError> {
        Ok(self.watched.iter().any(|e| e.value().iter().any(|u| u.tx_id == tx_id)))
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String, CoreError> {
        let tx_id = hex::encode(sha2::Sha256::digest(raw_tx));
        self.broadcast_log.lock().await.push(tx_id.clone());
        Ok(tx_id)
    }

    async fn recommended_fee_rate(&self, confirmation_target: u32) -> Result<u64, CoreError> {
        let base = match confirmation_target {
            0..=1 => 20.0,
            2..=3 => 10.0,
            4..=6 => 5.0,
            _ => 2.0,
        };
        Ok((base * self.recommend_fee_multiplier).ceil() as u64)
    }

    async fn send_to_address(
        &self,
        address: &str,
        amount_sats: u64,
        fee_rate_sats_per_vbyte: u64,
    ) -> Result<String, CoreError> {
        let n = self.send_counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = sha2::Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(amount_sats.to_le_bytes());
        hasher.update(fee_rate_sats_per_vbyte.to_le_bytes());
        hasher.update(n.to_le_bytes());
        let tx_id = hex::encode(hasher.finalize());
        self.broadcast_log.lock().await.push(tx_id.clone());
        self.sent.insert(tx_id.clone(), 0);
        Ok(tx_id)
    }

    async fn tx_confirmations(&self, tx_id: &str) -> Result<u32, CoreError> {
        let mut entry = self.sent.entry(tx_id.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}
