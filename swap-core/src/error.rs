//! Layered error taxonomy for the swap engine.
//!
//! Each component gets its own error enum; `CoreError` wraps them at the
//! crate boundary so callers outside `swap-core` only ever match on one type.

use thiserror::Error;

use crate::types::Direction;

/// Errors raised while building or validating a quote.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("amount {amount} below minimum {min}")]
    AmountTooLow { amount: u128, min: u128 },

    #[error("amount {amount} above maximum {max}")]
    AmountTooHigh { amount: u128, max: u128 },

    #[error("token not supported: {0}")]
    TokenUnsupported(String),

    #[error("insufficient liquidity for {amount} on {direction:?}")]
    InsufficientLiquidity { direction: Direction, amount: u128 },

    #[error("price stale: age {age_secs}s exceeds ttl {ttl_secs}s")]
    PriceStale { age_secs: u64, ttl_secs: u64 },

    #[error("quoted price diverges from oracle by {diff_ppm} ppm, exceeds {max_ppm} ppm")]
    PriceDeviation { diff_ppm: i64, max_ppm: u64 },

    #[error("operation aborted by caller")]
    Aborted,

    #[error("internal signing failure: {0}")]
    InternalSign(String),

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

/// Errors raised while advancing a swap's state machine.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("illegal transition for {direction:?}: {from} -> {to}")]
    IllegalTransition {
        direction: Direction,
        from: String,
        to: String,
    },

    #[error("swap {0} not found")]
    NotFound(String),

    #[error("swap {0} already exists")]
    AlreadyExists(String),

    #[error("swap {0} is in a terminal state and cannot be mutated")]
    Terminal(String),

    #[error("lock for swap {0} could not be acquired within {1:?}")]
    LockTimeout(String, std::time::Duration),
}

/// Errors surfaced by the Bitcoin on-chain watcher.
#[derive(Error, Debug)]
pub enum BitcoinWatcherError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("address {0} is not being watched")]
    NotWatched(String),

    #[error("double-spend detected for {0}")]
    DoubleSpend(String),

    #[error("invalid txo hash")]
    InvalidTxoHash,
}

/// Errors surfaced by the Lightning adapter.
#[derive(Error, Debug)]
pub enum LightningError {
    #[error("node rpc error: {0}")]
    Rpc(String),

    #[error("invoice decode failed: {0}")]
    InvoiceDecode(String),

    #[error("no route found")]
    NoRoute,

    #[error("payment failed permanently: {0}")]
    PermanentFailure(String),

    #[error("htlc already settled")]
    AlreadySettled,
}

/// Errors surfaced by the abstract SC-chain capability (`SwapContract`).
#[derive(Error, Debug)]
pub enum ChainAdapterError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("swap data rejected by chain: {0}")]
    Rejected(String),

    #[error("transaction {0} not confirmed")]
    NotConfirmed(String),
}

/// Errors surfaced by the durable storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("schema migration failed at version {0}")]
    Migration(u32),
}

/// Top-level error type for `swap-core`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("bitcoin watcher error: {0}")]
    BitcoinWatcher(#[from] BitcoinWatcherError),

    #[error("lightning error: {0}")]
    Lightning(#[from] LightningError),

    #[error("chain adapter error: {0}")]
    ChainAdapter(#[from] ChainAdapterError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("pricing error: {0}")]
    Pricing(String),

    #[error("{0}")]
    Other(String),
}

/// Errors that must never be retried by [`crate::retry::try_with_retries`].
pub fn is_non_retryable(err: &CoreError) -> bool {
    matches!(
        err,
        CoreError::ChainAdapter(ChainAdapterError::SignatureVerification)
            | CoreError::Quote(QuoteError::Aborted)
            | CoreError::State(StateError::IllegalTransition { .. })
            | CoreError::State(StateError::Terminal(_))
    )
}

pub type CoreResult<T> = Result<T, CoreError>;
