//! `FixedPriceProvider`: a stand-in for an exchange HTTP client (§2
//! PricingOracle's out-of-scope providers), serving operator-configured
//! prices rather than polling a real exchange.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use swap_core::error::CoreError;
use swap_core::pricing::PriceProvider;

#[derive(Default)]
pub struct FixedPriceProvider {
    prices: RwLock<HashMap<String, u64>>,
}

impl FixedPriceProvider {
    pub fn new(initial: HashMap<String, u64>) -> Self {
        Self {
            prices: RwLock::new(initial),
        }
    }

    fn key(chain_id: &str, token: &str) -> String {
        format!("{chain_id}:{token}")
    }

    /// Operator hook (e.g. a config-reload path) to push a fresh price.
    pub async fn set_price(&self, chain_id: &str, token: &str, micro_sat_per_token: u64) {
        self.prices
            .write()
            .await
            .insert(Self::key(chain_id, token), micro_sat_per_token);
    }
}

#[async_trait]
impl PriceProvider for FixedPriceProvider {
    async fn fetch_price(&self, chain_id: &str, token: &str) -> Result<u64, CoreError> {
        self.prices
            .read()
            .await
            .get(&Self::key(chain_id, token))
            .copied()
            .ok_or_else(|| CoreError::Pricing(format!("no configured price for {chain_id}:{token}")))
    }
}
