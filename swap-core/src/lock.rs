//! Per-`payment_hash` locking (§5): all mutations of a given swap are
//! serialized through a lock acquired with a bounded timeout; holders must
//! not acquire a second swap's lock (deadlock avoidance is enforced by
//! convention — [`SwapLockGuard`] is not `Clone` and callers should not
//! nest `with_lock` calls).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::error::StateError;
use crate::types::PaymentHash;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Holds one `tokio::sync::Mutex` per `payment_hash`, created lazily.
/// Locks are never removed: the number of distinct swaps an LP ever
/// creates is bounded by its traffic, not a leak risk worth the
/// complexity of reference-counted eviction.
#[derive(Default)]
pub struct LockManager {
    locks: DashMap<PaymentHash, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    fn mutex_for(&self, hash: PaymentHash) -> Arc<Mutex<()>> {
        self.locks
            .entry(hash)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for `hash`, failing with [`StateError::LockTimeout`]
    /// if it isn't free within the configured timeout. A tick that skips a
    /// busy swap is expected behavior (§5): the next watchdog tick retries.
    pub async fn acquire(&self, hash: PaymentHash) -> Result<SwapLockGuard, StateError> {
        let mutex = self.mutex_for(hash);
        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(SwapLockGuard { _guard: guard }),
            Err(_) => {
                warn!(payment_hash = %hash, timeout_secs = self.timeout.as_secs(), "lock acquisition timed out");
                Err(StateError::LockTimeout(hash.to_hex(), self.timeout))
            }
        }
    }
}

/// RAII guard releasing the per-hash lock on drop. Intentionally not
/// `Clone`/`Copy` so a task cannot accidentally hold two at once.
pub struct SwapLockGuard {
    _guard: OwnedMutexGuard<()>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_acquire_on_same_hash_serializes() {
        let mgr = Arc::new(LockManager::with_timeout(Duration::from_millis(200)));
        let hash = PaymentHash([1u8; 32]);
        let guard = mgr.acquire(hash).await.unwrap();

        let mgr2 = mgr.clone();
        let handle = tokio::spawn(async move { mgr2.acquire(hash).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);

        let second = handle.await.unwrap();
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn different_hashes_do_not_contend() {
        let mgr = LockManager::new();
        let a = mgr.acquire(PaymentHash([1u8; 32])).await.unwrap();
        let b = mgr.acquire(PaymentHash([2u8; 32])).await.unwrap();
        drop(a);
        drop(b);
    }
}
