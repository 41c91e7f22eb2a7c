//! Top-level wiring: assembles `SwapCore` from `NodeConfig`, the local
//! reference adapters, and storage, then spawns the watchdogs and the API
//! server. Mirrors the teacher's `node::Node::new`/`run` split between
//! construction and the long-running process.

use std::collections::HashMap;
use std::sync::Arc;

use secp256k1::SecretKey;
use serde::Serialize;
use tracing::info;

use swap_core::engine::{DirectionConfig, EngineConfig};
use swap_core::identity::IdentityService;
use swap_core::lightning::RoutingBounds;
use swap_core::plugin::PluginBus;
use swap_core::pricing::CachedPricingOracle;
use swap_core::storage::SwapStorage;
use swap_core::SwapCore;

use crate::adapters::{FixedPriceProvider, LocalBitcoinWatcher, LocalLightningAdapter, LocalSwapContract};
use crate::api::{ApiServer, ApiServerConfig};
use crate::config::{NodeConfig, StorageBackend};
use crate::storage::{FileSwapStorage, MemorySwapStorage};
use crate::{metrics, watchdogs};

/// The directions and tokens this LP quotes, signed into `/info`
/// responses (§4.7 `IntermediaryDiscovery`) so a client can learn the
/// LP's capabilities without guessing at supported routes.
#[derive(Clone, Serialize)]
pub struct ServiceCatalog {
    chain_id: String,
    directions: Vec<DirectionSummary>,
}

#[derive(Clone, Serialize)]
struct DirectionSummary {
    direction: String,
    token: String,
    min_sats: String,
    max_sats: String,
}

impl ServiceCatalog {
    fn from_config(config: &NodeConfig) -> Self {
        let directions = config
            .directions
            .iter()
            .map(|(direction, settings)| DirectionSummary {
                direction: direction.as_str().to_string(),
                token: settings.token.clone(),
                min_sats: settings.min_sats.to_string(),
                max_sats: settings.max_sats.to_string(),
            })
            .collect();
        Self {
            chain_id: config.chain_id.clone(),
            directions,
        }
    }

    pub fn as_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn build_engine_config(config: &NodeConfig) -> EngineConfig {
    let (process_past_swaps_interval, double_spend_watchdog_interval, lock_timeout) =
        config.watchdog_durations();

    let directions = config
        .directions
        .iter()
        .map(|(direction, settings)| {
            let dc = DirectionConfig {
                params: settings.quote_params(),
                token: settings.token.clone(),
                token_decimals_factor: settings.token_decimals_factor(),
                confirmations_required: settings.confirmations_required,
                confirmation_target: settings.confirmation_target,
                quote_ttl_secs: settings.quote_ttl_secs,
                min_ln_confidence: settings.min_ln_confidence,
                routing_bounds: RoutingBounds {
                    max_routing_base_fee_sats: settings.max_routing_base_fee_sats,
                    max_routing_ppm: settings.max_routing_ppm,
                },
            };
            (*direction, dc)
        })
        .collect::<HashMap<_, _>>();

    EngineConfig {
        process_past_swaps_interval,
        double_spend_watchdog_interval,
        lock_timeout,
        to_btc_send_safety_margin_secs: config.watchdogs.to_btc_send_safety_margin_secs,
        directions,
    }
}

async fn build_storage(config: &NodeConfig) -> anyhow::Result<Arc<dyn SwapStorage>> {
    Ok(match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemorySwapStorage::new()),
        StorageBackend::File => Arc::new(FileSwapStorage::new(config.storage.path.clone()).await?),
    })
}

fn initial_prices(config: &NodeConfig) -> HashMap<String, u64> {
    // No live price feed is wired up for the reference adapters (§1 out of
    // scope); seed a flat 1 token == 1 sat figure per direction's token so
    // the node can still quote out of the box.
    config
        .directions
        .values()
        .map(|settings| (format!("{}:{}", config.chain_id, settings.token), 1_000_000u64))
        .collect()
}

pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
    info!(chain_id = %config.chain_id, "assembling swap core");

    let identity = Arc::new(IdentityService::new(SecretKey::new(&mut rand::thread_rng())));
    info!(address = %identity.address(), "loaded LP identity");

    let chain = Arc::new(LocalSwapContract::new(Arc::clone(&identity)));
    let btc = Arc::new(LocalBitcoinWatcher::new());
    let lightning = Arc::new(LocalLightningAdapter::new(0.8));
    let pricing_provider = Arc::new(FixedPriceProvider::new(initial_prices(&config)));
    let pricing = Arc::new(CachedPricingOracle::new(
        vec![pricing_provider as Arc<dyn swap_core::pricing::PriceProvider>],
        std::time::Duration::from_secs(config.pricing.cache_ttl_secs),
    ));
    let storage = build_storage(&config).await?;
    let plugins = Arc::new(PluginBus::new());

    let engine_config = build_engine_config(&config);
    let core = Arc::new(SwapCore::new(
        config.chain_id.clone(),
        config.lp_address.clone(),
        engine_config,
        storage,
        chain,
        btc,
        lightning,
        pricing,
        plugins,
    ));

    let metrics_addr: std::net::SocketAddr = "0.0.0.0:9100".parse().expect("valid metrics listener address");
    if let Err(e) = metrics::install(metrics_addr) {
        tracing::warn!(error = %e, "metrics exporter failed to install, continuing without it");
    }

    let (process_past_swaps_interval, double_spend_watchdog_interval, _) = config.watchdog_durations();
    let _process_past_swaps = watchdogs::spawn_process_past_swaps(Arc::clone(&core), process_past_swaps_interval);
    let _double_spend_watchdog = watchdogs::spawn_double_spend_watchdog(Arc::clone(&core), double_spend_watchdog_interval);
    let _event_loop = watchdogs::spawn_event_loop(Arc::clone(&core));
    let _eviction_sweep = watchdogs::spawn_eviction_sweep(
        Arc::clone(&core),
        process_past_swaps_interval,
        std::time::Duration::from_secs(config.watchdogs.eviction_grace_secs),
    );

    let services = ServiceCatalog::from_config(&config);
    let server = ApiServer::new(
        Arc::clone(&core),
        identity,
        services,
        ApiServerConfig::from(&config.api),
    );
    server.start().await?.await?;
    Ok(())
}
