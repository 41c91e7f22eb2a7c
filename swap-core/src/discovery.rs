//! IntermediaryDiscovery (§4.7): a client-side mirror that fetches LPs
//! from a registry, calls each one's `/info` with a fresh nonce, verifies
//! the signature, and ranks by total fee. The LP side of this crate never
//! calls these functions; they exist so an LP's own CLI/node tooling can
//! shop quotes against peer intermediaries the same way a wallet would.

use std::collections::HashMap;
use std::time::Duration;

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::identity::{generate_nonce, IdentityService};
use crate::types::{Amount, Direction};

/// A single direction's published bounds and fee schedule, as returned
/// under `/info`'s `services` map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(rename = "swapFeePPM")]
    pub swap_fee_ppm: u64,
    #[serde(rename = "swapBaseFee")]
    pub swap_base_fee: Amount,
    pub min: Amount,
    pub max: Amount,
    pub tokens: Vec<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InfoEnvelope {
    pub nonce: String,
    pub services: HashMap<String, ServiceInfo>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub address: String,
    pub envelope: InfoEnvelope,
    pub signature: String,
}

#[derive(Clone, Debug)]
pub struct LpListing {
    pub base_url: String,
    pub address: String,
    pub info: InfoEnvelope,
}

impl LpListing {
    /// Total fee in base units for `amount` under `direction`'s quoted
    /// token, `base + amount * ppm / 1e6` (§4.7 ranking formula). Returns
    /// `None` when the LP does not advertise this direction.
    pub fn total_fee(&self, direction: Direction, amount: Amount) -> Option<Amount> {
        let service = self.info.services.get(direction_key(direction))?;
        let ppm_cut = amount.saturating_mul(service.swap_fee_ppm as u128) / 1_000_000;
        Some(service.swap_base_fee + ppm_cut)
    }
}

fn direction_key(direction: Direction) -> &'static str {
    match direction {
        Direction::FromBtc => "FROM_BTC",
        Direction::FromBtcLn => "FROM_BTCLN",
        Direction::ToBtc => "TO_BTC",
        Direction::ToBtcLn => "TO_BTCLN",
        Direction::TrustedFromBtcLn => "FROM_BTCLN",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("http error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed public key for {0}")]
    BadPublicKey(String),
    #[error("envelope signature verification failed for {0}")]
    BadSignature(String),
    #[error("nonce mismatch: requested {requested}, received {received}")]
    NonceMismatch { requested: String, received: String },
}

/// Fetches and verifies `/info` from a single LP base URL.
pub async fn fetch_info(client: &reqwest::Client, base_url: &str) -> Result<LpListing, DiscoveryError> {
    let nonce = hex::encode(generate_nonce());
    let url = format!("{base_url}/info");
    let resp: InfoResponse = client
        .post(&url)
        .json(&serde_json::json!({ "nonce": nonce }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| DiscoveryError::Http {
            url: url.clone(),
            source: e,
        })?
        .json()
        .await
        .map_err(|e| DiscoveryError::Http { url, source: e })?;

    if resp.envelope.nonce != nonce {
        return Err(DiscoveryError::NonceMismatch {
            requested: nonce,
            received: resp.envelope.nonce.clone(),
        });
    }

    let pubkey_bytes = hex::decode(&resp.address)
        .map_err(|_| DiscoveryError::BadPublicKey(resp.address.clone()))?;
    let public_key = PublicKey::from_slice(&pubkey_bytes)
        .map_err(|_| DiscoveryError::BadPublicKey(resp.address.clone()))?;

    let verified = IdentityService::verify_envelope(&public_key, &resp.envelope, &resp.signature)
        .unwrap_or(false);
    if !verified {
        return Err(DiscoveryError::BadSignature(resp.address.clone()));
    }

    Ok(LpListing {
        base_url: base_url.to_string(),
        address: resp.address,
        info: resp.envelope,
    })
}

/// Fetches `/info` from every registry entry, logging and dropping any LP
/// that fails to respond or verify rather than failing the whole lookup.
pub async fn fetch_all(client: &reqwest::Client, registry: &[String]) -> Vec<LpListing> {
    let mut out = Vec::with_capacity(registry.len());
    for base_url in registry {
        match fetch_info(client, base_url).await {
            Ok(listing) => out.push(listing),
            Err(e) => warn!(base_url, error = %e, "dropping unreachable or unverifiable LP"),
        }
    }
    out
}

/// Ranks listings supporting `direction` by ascending total fee for
/// `amount`, cheapest first, per §4.7.
pub fn rank_by_fee(listings: &[LpListing], direction: Direction, amount: Amount) -> Vec<&LpListing> {
    let mut ranked: Vec<&LpListing> = listings
        .iter()
        .filter(|l| l.total_fee(direction, amount).is_some())
        .collect();
    ranked.sort_by_key(|l| l.total_fee(direction, amount).unwrap());
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(base_fee: Amount, ppm: u64) -> LpListing {
        let mut services = HashMap::new();
        services.insert(
            "FROM_BTC".to_string(),
            ServiceInfo {
                swap_fee_ppm: ppm,
                swap_base_fee: base_fee,
                min: 1_000,
                max: 1_000_000,
                tokens: vec!["TOK".into()],
                data: None,
            },
        );
        LpListing {
            base_url: "http://example".into(),
            address: "aa".into(),
            info: InfoEnvelope {
                nonce: "n".into(),
                services,
            },
        }
    }

    #[test]
    fn ranks_cheapest_first() {
        let cheap = listing(100, 1_000);
        let pricey = listing(500, 5_000);
        let ranked = rank_by_fee(&[pricey, cheap], Direction::FromBtc, 100_000);
        assert_eq!(ranked[0].total_fee(Direction::FromBtc, 100_000), Some(100 + 100));
    }

    #[test]
    fn listings_without_direction_are_excluded() {
        let mut services = HashMap::new();
        services.insert(
            "TO_BTC".to_string(),
            ServiceInfo {
                swap_fee_ppm: 0,
                swap_base_fee: 0,
                min: 0,
                max: 0,
                tokens: vec![],
                data: None,
            },
        );
        let only_to_btc = LpListing {
            base_url: "http://x".into(),
            address: "aa".into(),
            info: InfoEnvelope {
                nonce: "n".into(),
                services,
            },
        };
        let ranked = rank_by_fee(&[only_to_btc], Direction::FromBtc, 1_000);
        assert!(ranked.is_empty());
    }
}
