//! BitcoinWatcher: observes on-chain addresses for matching UTXOs, tracks
//! confirmations, and detects replacement/double-spend (§2, 10%).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BitcoinWatcherError, CoreError};

/// Bitcoin's standard dust threshold (§4.6): a refund output below this
/// is worth less than it costs to spend, so it's dropped instead of sent.
pub const DUST_LIMIT_SATS: u64 = 546;

/// `sha256(LE64(value) || scriptPubKey)` — a content address for a
/// specific output, used to bind a Bitcoin deposit to a quote without
/// needing a fresh address per swap on reused-address wallets.
pub fn txo_hash(value_sats: u64, script_pubkey: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value_sats.to_le_bytes());
    hasher.update(script_pubkey);
    hasher.finalize().into()
}

/// `sha256(scriptPubKey || LE64(amount) || LE64(nonce))` — binds a ToBtc
/// SC-chain escrow to the exact output the LP is obligated to pay (§4.4),
/// so the LP can't satisfy the escrow with a payment to any other output.
pub fn to_btc_payout_hash(script_pubkey: &[u8], amount_sats: u64, nonce: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(script_pubkey);
    hasher.update(amount_sats.to_le_bytes());
    hasher.update(nonce.to_le_bytes());
    hasher.finalize().into()
}

/// Builds a minimal `OP_RETURN` output package carrying a swap's payment
/// hash, broadcast alongside the still-valid inputs of a double-spent
/// funding tx to burn its proceeds (§4.6). `0x6a` is `OP_RETURN`; the
/// push opcode is the literal 32-byte length since payment hashes never
/// exceed the 75-byte direct-push limit.
pub fn build_burn_package(payment_hash: &[u8; 32]) -> Vec<u8> {
    let mut script = Vec::with_capacity(2 + payment_hash.len());
    script.push(0x6a);
    script.push(payment_hash.len() as u8);
    script.extend_from_slice(payment_hash);
    script
}

/// A UTXO observed at a watched address, as reported by the Bitcoin RPC
/// client (out of scope; abstract interface only per §1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObservedUtxo {
    pub tx_id: String,
    pub vout: u32,
    pub value_sats: u64,
    pub script_pubkey: Vec<u8>,
    pub confirmations: u32,
    pub block_height: Option<u64>,
    pub confirmed: bool,
    pub seen_at: u64,
}

/// The abstract Bitcoin-node capability the engine depends on. Concrete
/// implementations (bitcoind RPC, Electrum, etc.) live outside this crate.
#[async_trait]
pub trait BitcoinWatcher: Send + Sync {
    /// Start watching an address for deposits.
    async fn watch_address(&self, address: &str) -> Result<(), CoreError>;

    /// Stop watching an address once its swap has settled or expired.
    async fn unwatch_address(&self, address: &str) -> Result<(), CoreError>;

    /// All UTXOs currently known at a watched address.
    async fn utxos_at(&self, address: &str) -> Result<Vec<ObservedUtxo>, CoreError>;

    /// Whether a previously-seen transaction is still present in the
    /// mempool or a block (used by the double-spend watchdog, §5).
    async fn tx_still_present(&self, tx_id: &str) -> Result<bool, CoreError>;

    /// Broadcast a raw transaction (used for refunds and OP_RETURN burns).
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String, CoreError>;

    /// Current recommended fee rate in sats/vbyte for a confirmation
    /// target, scaled by the caller's `recommend_fee_multiplier` policy
    /// (§9(c) — the 1.25x default is a policy parameter, not derived).
    async fn recommended_fee_rate(&self, confirmation_target: u32) -> Result<u64, CoreError>;

    /// Sends `amount_sats` to `address` at the given fee rate, returning
    /// the broadcast tx id. Used for ToBtc payouts and dust-limited
    /// refunds (§4.4, §4.6).
    async fn send_to_address(
        &self,
        address: &str,
        amount_sats: u64,
        fee_rate_sats_per_vbyte: u64,
    ) -> Result<String, CoreError>;

    /// Confirmation count of a transaction the LP itself broadcast
    /// (distinct from `tx_still_present`'s presence check).
    async fn tx_confirmations(&self, tx_id: &str) -> Result<u32, CoreError>;
}

/// Selects the winning deposit when multiple UTXOs land at the same
/// address: the earliest confirmed one wins, sorted `(confirmed desc,
/// block_height asc)` as specified in §4.2's tie-break rule. Later
/// deposits are left for the watcher to ignore or refund separately.
pub fn select_winning_utxo(utxos: &[ObservedUtxo]) -> Option<&ObservedUtxo> {
    utxos.iter().min_by(|a, b| {
        // confirmed desc: unconfirmed (false) sorts after confirmed (true).
        let conf_key = |u: &ObservedUtxo| !u.confirmed;
        conf_key(a)
            .cmp(&conf_key(b))
            .then_with(|| {
                a.block_height
                    .unwrap_or(u64::MAX)
                    .cmp(&b.block_height.unwrap_or(u64::MAX))
            })
            .then_with(|| a.seen_at.cmp(&b.seen_at))
    })
}

/// Finds the UTXO whose `(value, scriptPubKey)` hashes to the swap's
/// expected `txo_hash`, rejecting spoofed deposits that merely reuse the
/// watched address but pay a different amount.
pub fn find_matching_utxo<'a>(
    utxos: &'a [ObservedUtxo],
    expected_hash: &[u8; 32],
) -> Result<Option<&'a ObservedUtxo>, BitcoinWatcherError> {
    for u in utxos {
        if &txo_hash(u.value_sats, &u.script_pubkey) == expected_hash {
            return Ok(Some(u));
        }
    }
    Ok(None)
}

/// Deposits paying the watched address's `scriptPubKey` regardless of
/// value, the fallback path for underpaid/overpaid deposits (§4.2
/// scenarios 2/3) once an exact `txo_hash` match comes up empty.
pub fn utxos_matching_script(utxos: &[ObservedUtxo], script_pubkey: &[u8]) -> Vec<ObservedUtxo> {
    utxos
        .iter()
        .filter(|u| u.script_pubkey == script_pubkey)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(confirmed: bool, height: Option<u64>, seen_at: u64) -> ObservedUtxo {
        ObservedUtxo {
            tx_id: "tx".into(),
            vout: 0,
            value_sats: 100_000,
            script_pubkey: vec![0u8; 22],
            confirmations: if confirmed { 1 } else { 0 },
            block_height: height,
            confirmed,
            seen_at,
        }
    }

    #[test]
    fn earliest_confirmed_wins_over_later_confirmed() {
        let early = utxo(true, Some(100), 10);
        let late = utxo(true, Some(200), 20);
        let utxos = vec![late.clone(), early.clone()];
        let winner = select_winning_utxo(&utxos).unwrap();
        assert_eq!(winner.block_height, Some(100));
    }

    #[test]
    fn confirmed_beats_unconfirmed_regardless_of_arrival() {
        let unconfirmed = utxo(false, None, 1);
        let confirmed = utxo(true, Some(500), 50);
        let utxos = vec![unconfirmed, confirmed.clone()];
        let winner = select_winning_utxo(&utxos).unwrap();
        assert!(winner.confirmed);
    }

    #[test]
    fn txo_hash_binds_value_and_script() {
        let a = txo_hash(100_000, &[1, 2, 3]);
        let b = txo_hash(100_001, &[1, 2, 3]);
        assert_ne!(a, b);
    }

    #[test]
    fn find_matching_utxo_rejects_wrong_amount() {
        let expected = txo_hash(100_000, &[9u8; 22]);
        let wrong = utxo(true, Some(1), 1);
        let found = find_matching_utxo(&[wrong], &expected).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn to_btc_payout_hash_binds_script_amount_and_nonce() {
        let a = to_btc_payout_hash(&[1, 2, 3], 50_000, 7);
        let b = to_btc_payout_hash(&[1, 2, 3], 50_001, 7);
        let c = to_btc_payout_hash(&[1, 2, 3], 50_000, 8);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn utxos_matching_script_ignores_other_scripts() {
        let mut mine = utxo(true, Some(1), 1);
        mine.script_pubkey = vec![1u8; 22];
        let mut other = utxo(true, Some(1), 1);
        other.script_pubkey = vec![2u8; 22];
        let found = utxos_matching_script(&[mine, other], &[1u8; 22]);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn burn_package_carries_the_payment_hash() {
        let hash = [5u8; 32];
        let pkg = build_burn_package(&hash);
        assert_eq!(pkg[0], 0x6a);
        assert_eq!(pkg[1], 32);
        assert_eq!(&pkg[2..], &hash);
    }
}
