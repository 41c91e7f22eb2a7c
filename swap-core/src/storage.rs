//! Durable storage: `payment_hash_hex -> serialized swap JSON` (§6). The
//! backend itself (any key/value store) is out of scope per §1; this
//! module defines the trait the engine depends on plus the versioned
//! migration for the one legacy schema change called out in §6/§9.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::swap::Swap;
use crate::types::PaymentHash;

/// Current on-disk schema version. Bumped whenever a field's meaning
/// changes in a way that needs a migration (append-only per §6).
pub const SCHEMA_VERSION: u32 = 1;

/// The abstract storage capability the engine depends on. Implementations
/// (sled, a file-per-key store, a remote KV service, …) live outside this
/// crate; `swap-node` ships a reference in-memory implementation for
/// tests and a reference file-backed implementation for production use.
#[async_trait]
pub trait SwapStorage: Send + Sync {
    async fn get(&self, hash: PaymentHash) -> Result<Option<Swap>, StorageError>;

    /// Insert or overwrite a swap record. Callers are responsible for
    /// holding the per-hash lock (§5) before calling this.
    async fn put(&self, swap: &Swap) -> Result<(), StorageError>;

    async fn delete(&self, hash: PaymentHash) -> Result<(), StorageError>;

    /// All swaps not yet in a terminal state, for `processPastSwaps`
    /// (§5 watchdog 1) to re-drive on restart (P8).
    async fn list_unfinished(&self) -> Result<Vec<Swap>, StorageError>;

    /// All swaps, terminal or not; used by the eviction sweep (§10).
    async fn list_all(&self) -> Result<Vec<Swap>, StorageError>;
}

/// A versioned envelope wrapping the serialized swap, so a store that
/// predates a schema bump can be migrated in place on load.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VersionedRecord {
    pub version: u32,
    pub payload: serde_json::Value,
}

/// Legacy v0 numbered the `ToBtc` state enum differently (§6, §9): 0
/// created, 1 commited, 2 sent, 3 claimed, 4 refunded — collapsing the
/// `BtcSending` distinction the canonical v1 enumeration makes. Migrating
/// forward maps the old numeric code to the new state name.
pub fn migrate_legacy_to_btc_state(v0_code: u64) -> Result<&'static str, StorageError> {
    match v0_code {
        0 => Ok("created"),
        1 => Ok("commited"),
        2 => Ok("btc_sent"),
        3 => Ok("claimed"),
        4 => Ok("refunded"),
        _ => Err(StorageError::Migration(SCHEMA_VERSION)),
    }
}

/// Deserializes a record, running the legacy migration when its version
/// predates [`SCHEMA_VERSION`].
pub fn decode_record(record: VersionedRecord) -> Result<Swap, StorageError> {
    let mut payload = record.payload;
    if record.version == 0 {
        if let Some(obj) = payload.as_object_mut() {
            if obj.get("direction").and_then(|v| v.as_str()) == Some("to_btc") {
                if let Some(code) = obj.get("legacy_state_code").and_then(|v| v.as_u64()) {
                    let mapped = migrate_legacy_to_btc_state(code)?;
                    obj.insert("state".to_string(), serde_json::Value::String(mapped.to_string()));
                    obj.remove("legacy_state_code");
                }
            }
        }
    }
    serde_json::from_value(payload).map_err(StorageError::from)
}

pub fn encode_record(swap: &Swap) -> Result<VersionedRecord, StorageError> {
    Ok(VersionedRecord {
        version: SCHEMA_VERSION,
        payload: serde_json::to_value(swap)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_state_codes_map_to_canonical_names() {
        assert_eq!(migrate_legacy_to_btc_state(2).unwrap(), "btc_sent");
        assert!(migrate_legacy_to_btc_state(99).is_err());
    }
}
