//! In-memory `SwapStorage`, used by the integration tests and as the
//! default for a `StorageBackend::Memory` config.

use async_trait::async_trait;
use dashmap::DashMap;

use swap_core::error::StorageError;
use swap_core::storage::SwapStorage;
use swap_core::swap::Swap;
use swap_core::types::PaymentHash;

#[derive(Default)]
pub struct MemorySwapStorage {
    records: DashMap<[u8; 32], Swap>,
}

impl MemorySwapStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SwapStorage for MemorySwapStorage {
    async fn get(&self, hash: PaymentHash) -> Result<Option<Swap>, StorageError> {
        Ok(self.records.get(&hash.0).map(|r| r.clone()))
    }

    async fn put(&self, swap: &Swap) -> Result<(), StorageError> {
        self.records.insert(swap.payment_hash().0, swap.clone());
        Ok(())
    }

    async fn delete(&self, hash: PaymentHash) -> Result<(), StorageError> {
        self.records.remove(&hash.0);
        Ok(())
    }

    async fn list_unfinished(&self) -> Result<Vec<Swap>, StorageError> {
        Ok(self
            .records
            .iter()
            .filter(|r| !r.is_terminal())
            .map(|r| r.clone())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Swap>, StorageError> {
        Ok(self.records.iter().map(|r| r.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swap_core::swap::FromBtcSwap;
    use swap_core::state::FromBtcState;
    use swap_core::types::{
        Metadata, PriceInfo, SignedQuote, SwapBase, SwapData, SwapDataType, TxIds,
    };
    use swap_core::types::Direction;

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
    async fn put_then_get_round_trips() {
        let store = MemorySwapStorage::new();
        let swap = sample([1u8; 32]);
        store.put(&swap).await.unwrap();
        let fetched = store.get(PaymentHash([1u8; 32])).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn list_unfinished_excludes_terminal_swaps() {
        let store = MemorySwapStorage::new();
        store.put(&sample([2u8; 32])).await.unwrap();
        let mut terminal = match sample([3u8; 32]) {
            Swap::FromBtc(s) => s,
            _ => unreachable!(),
        };
        terminal.state = FromBtcState::Expired;
        store.put(&Swap::FromBtc(terminal)).await.unwrap();

        let unfinished = store.list_unfinished().await.unwrap();
        assert_eq!(unfinished.len(), 1);
    }
}
