//! File-per-key JSON `SwapStorage` (§6 "store is a map `payment_hash_hex ->
//! serialized_swap_json`"). Each swap lives at `<root>/<hash_hex>.json` as a
//! [`VersionedRecord`], so the v0->v1 migration in `swap_core::storage`
//! runs transparently on read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use swap_core::error::StorageError;
use swap_core::storage::{decode_record, encode_record, SwapStorage, VersionedRecord};
use swap_core::swap::Swap;
use swap_core::types::PaymentHash;

pub struct FileSwapStorage {
    root: PathBuf,
}

impl FileSwapStorage {
    /// Creates the store rooted at `root`, creating the directory if absent.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { root })
    }

    fn path_for(&self, hash: PaymentHash) -> PathBuf {
        self.root.join(format!("{}.json", hash.to_hex()))
    }

    async fn read_all(&self) -> Result<Vec<Swap>, StorageError> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let mut swaps = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load_file(&path).await {
                Ok(swap) => swaps.push(swap),
                Err(e) => warn!(path = ?path, error = %e, "skipping unreadable swap record"),
            }
        }
        Ok(swaps)
    }

    async fn load_file(path: &Path) -> Result<Swap, StorageError> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let record: VersionedRecord = serde_json::from_slice(&bytes)?;
        decode_record(record)
    }
}

#[async_trait]
impl SwapStorage for FileSwapStorage {
    async fn get(&self, hash: PaymentHash) -> Result<Option<Swap>, StorageError> {
        let path = self.path_for(hash);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::load_file(&path).await?))
    }

    async fn put(&self, swap: &Swap) -> Result<(), StorageError> {
        let record = encode_record(swap)?;
        let bytes = serde_json::to_vec_pretty(&record)?;
        let path = self.path_for(swap.payment_hash());
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, hash: PaymentHash) -> Result<(), StorageError> {
        let path = self.path_for(hash);
        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn list_unfinished(&self) -> Result<Vec<Swap>, StorageError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|s| !s.is_terminal())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Swap>, StorageError> {
        self.read_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swap_core::swap::FromBtcSwap;
    use swap_core::state::FromBtcState;
    use swap_core::types::{
        Direction, Metadata, PriceInfo, SignedQuote, SwapBase, SwapData, SwapDataType, TxIds,
    };

    fn sample(hash: [u8; 32]) -> Swap {
        Swap::FromBtc(FromBtcSwap {
            base: SwapBase {
                payment_hash: PaymentHash(hash),
                direction: Direction::FromBtc,
                chain_id: "test".into(),
                swap_data: SwapData {
                    offerer: "a".into(),
                    claimer: "b".into(),
                    token: "TOK".into(),
                    amount: 1,
                    hash,
                    expiry: 0,
                    confirmations: 1,
                    sequence: 0,
                    security_deposit: 0,
                    claimer_bounty: 0,
                    swap_type: SwapDataType::Htlc,
                    pay_in: false,
                },
                swap_fee: 0,
                swap_fee_btc: 0,
                network_fee: None,
                price_info: PriceInfo {
                    base_fee_sats: 0,
                    fee_ppm: 0,
                    swap_price_micro_sat_per_token: 1,
                },
                signed_quote: SignedQuote {
                    prefix: "swap".into(),
                    timeout: 0,
                    signature: String::new(),
                    fee_rate: None,
                },
                tx_ids: TxIds::default(),
                metadata: Metadata::default(),
                created_at: 0,
                expires_at: 0,
            },
            state: FromBtcState::Created,
            btc_address: "addr".into(),
            amount_sats: 1,
            txo_hash: [0u8; 32],
            script_pubkey: vec![0u8; 22],
            confirmations_required: 1,
            observed_tx_id: None,
            observed_vout: None,
            adjusted_input: None,
            adjusted_output: None,
            refund_address: None,
            refund_reason: None,
        })
    }

    #[tokio::test]
    async fn put_then_get_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("swap-node-test-{}", uuid::Uuid::new_v4()));
        let store = FileSwapStorage::new(&dir).await.unwrap();
        let swap = sample([9u8; 32]);
        store.put(&swap).await.unwrap();
        let fetched = store.get(PaymentHash([9u8; 32])).await.unwrap();
        assert!(fetched.is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let dir = std::env::temp_dir().join(format!("swap-node-test-{}", uuid::Uuid::new_v4()));
        let store = FileSwapStorage::new(&dir).await.unwrap();
        store.put(&sample([4u8; 32])).await.unwrap();
        store.delete(PaymentHash([4u8; 32])).await.unwrap();
        assert!(store.get(PaymentHash([4u8; 32])).await.unwrap().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
