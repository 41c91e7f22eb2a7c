//! Spawns `SwapCore`'s three watchdogs (§5) as long-running tokio tasks,
//! plus the eviction sweep supplementing `processPastSwaps` per §10's
//! bounded swap-record retention policy.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use swap_core::SwapCore;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spawns `process_past_swaps` on its configured interval.
pub fn spawn_process_past_swaps(core: Arc<SwapCore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            core.process_past_swaps().await;
        }
    })
}

/// Spawns `double_spend_watchdog` on its configured interval.
pub fn spawn_double_spend_watchdog(core: Arc<SwapCore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            core.double_spend_watchdog().await;
        }
    })
}

/// Spawns the SC-chain event loop, restarting it with a short backoff if
/// the subscription ever ends (chain RPC reconnects, for instance).
pub fn spawn_event_loop(core: Arc<SwapCore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = Arc::clone(&core).run_event_loop().await {
                error!(error = %e, "chain event loop ended, restarting in 5s");
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    })
}

/// Evicts terminal swaps older than `grace` past their `expires_at` (§10's
/// bounded eviction policy), piggybacked on the same cadence as
/// `processPastSwaps` so a delayed `getInvoiceStatus` poll still resolves
/// within the grace window.
pub fn spawn_eviction_sweep(core: Arc<SwapCore>, interval: Duration, grace: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            match core.storage.list_all().await {
                Ok(swaps) => {
                    for swap in swaps {
                        if !swap.is_terminal() {
                            continue;
                        }
                        let aged_out = now.saturating_sub(swap.base().expires_at) > grace.as_secs();
                        if aged_out {
                            let hash = swap.payment_hash();
                            if let Err(e) = core.storage.delete(hash).await {
                                error!(payment_hash = %hash, error = %e, "failed to evict finished swap");
                            } else {
                                info!(payment_hash = %hash, "evicted finished swap past grace period");
                            }
                        }
                    }
                }
                Err(e) => error!(error = %e, "eviction sweep failed to list swaps"),
            }
        }
    })
}
