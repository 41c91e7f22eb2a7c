//! PricingOracle: BTC/token price lookup with TTL caching over one or more
//! redundant providers (§2 PricingOracle, 8%).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;

/// A single price provider, e.g. an exchange HTTP client. Out of scope per
/// §1 ("price-oracle adapters"); this trait is the interface the engine
/// depends on.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Price of one token in micro-sats, for the given chain/token pair.
    async fn fetch_price(&self, chain_id: &str, token: &str) -> Result<u64, CoreError>;
}

struct CachedItem {
    price: u64,
    expires_at: Instant,
}

impl CachedItem {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Caches prices from a set of redundant providers with a TTL, falling
/// through to the next provider when one fails. The (chain_id, token)
/// nesting fixes the open question in §9(b): eviction removes the entry
/// under the nested key, not a flat `token` key that would collide across
/// chains.
pub struct CachedPricingOracle {
    providers: Vec<Arc<dyn PriceProvider>>,
    ttl: Duration,
    cache: RwLock<HashMap<String, HashMap<String, CachedItem>>>,
}

impl CachedPricingOracle {
    pub fn new(providers: Vec<Arc<dyn PriceProvider>>, ttl: Duration) -> Self {
        Self {
            providers,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached or freshly-fetched price, in micro-sats/token.
    pub async fn price(&self, chain_id: &str, token: &str) -> Result<u64, CoreError> {
        if let Some(price) = self.cached(chain_id, token).await {
            return Ok(price);
        }

        let mut last_err = None;
        for provider in &self.providers {
            match provider.fetch_price(chain_id, token).await {
                Ok(price) => {
                    self.insert(chain_id, token, price).await;
                    return Ok(price);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::Pricing("no price providers configured".into())))
    }

    async fn cached(&self, chain_id: &str, token: &str) -> Option<u64> {
        let cache = self.cache.read().await;
        let entry = cache.get(chain_id)?.get(token)?;
        if entry.is_expired() {
            None
        } else {
            Some(entry.price)
        }
    }

    async fn insert(&self, chain_id: &str, token: &str, price: u64) {
        let mut cache = self.cache.write().await;
        cache
            .entry(chain_id.to_string())
            .or_default()
            .insert(
                token.to_string(),
                CachedItem {
                    price,
                    expires_at: Instant::now() + self.ttl,
                },
            );
    }

    /// Evict a single (chain_id, token) cache entry, e.g. after a quote
    /// fails a price-deviation check and a fresh lookup is warranted.
    pub async fn evict(&self, chain_id: &str, token: &str) {
        let mut cache = self.cache.write().await;
        if let Some(per_chain) = cache.get_mut(chain_id) {
            per_chain.remove(token);
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Converts between satoshis and token base units given a price in
/// micro-sats/token and the token's decimal factor (e.g. `10u128.pow(18)`).
pub fn sats_to_token(sats: u128, decimals_factor: u128, micro_sat_per_token: u64) -> u128 {
    if micro_sat_per_token == 0 {
        return 0;
    }
    sats.saturating_mul(1_000_000)
        .saturating_mul(decimals_factor)
        / micro_sat_per_token as u128
}

pub fn token_to_sats(tokens: u128, decimals_factor: u128, micro_sat_per_token: u64) -> u128 {
    if decimals_factor == 0 {
        return 0;
    }
    tokens
        .saturating_mul(micro_sat_per_token as u128)
        / 1_000_000
        / decimals_factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedProvider {
        price: u64,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PriceProvider for FixedProvider {
        async fn fetch_price(&self, _chain_id: &str, _token: &str) -> Result<u64, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.price)
        }
    }

    #[tokio::test]
    async fn caches_across_calls_within_ttl() {
        let provider = Arc::new(FixedProvider {
            price: 1_000,
            calls: AtomicU32::new(0),
        });
        let oracle = CachedPricingOracle::new(vec![provider.clone()], Duration::from_secs(60));
        oracle.price("sc-1", "TOK").await.unwrap();
        oracle.price("sc-1", "TOK").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eviction_is_scoped_to_chain_and_token() {
        let provider = Arc::new(FixedProvider {
            price: 1_000,
            calls: AtomicU32::new(0),
        });
        let oracle = CachedPricingOracle::new(vec![provider.clone()], Duration::from_secs(60));
        oracle.price("sc-1", "TOK").await.unwrap();
        oracle.price("sc-2", "TOK").await.unwrap();
        oracle.evict("sc-1", "TOK").await;
        assert!(oracle.cached("sc-1", "TOK").await.is_none());
        assert!(oracle.cached("sc-2", "TOK").await.is_some());
    }

    #[test]
    fn sats_token_round_trip() {
        let sats = 100_000u128;
        let tokens = sats_to_token(sats, 100, 1_000);
        let back = token_to_sats(tokens, 100, 1_000);
        assert!((back as i128 - sats as i128).abs() <= 1);
    }
}
