//! Node-level error taxonomy (§7, §10). `ApiError` wraps `swap_core::CoreError`
//! plus the transport-facing failure modes REST handlers can hit on their own
//! (bad request bodies, unknown payment hashes, config problems), and carries
//! the numeric `code`/`msg` envelope the spec's error ranges describe.

use thiserror::Error;

use swap_core::CoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("unknown payment hash")]
    UnknownSwap,

    #[error("unsupported direction: {0}")]
    UnsupportedDirection(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("storage backend error: {0}")]
    Storage(String),
}

impl From<swap_core::error::StorageError> for ApiError {
    fn from(e: swap_core::error::StorageError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

/// Maps an `ApiError` onto the `{code, msg, data?}` envelope (§6). Ranges:
/// 10000-10099 success/status, 20000-20999 client validation, 21000+
/// intermediary-signalled refusals.
pub fn error_code(err: &ApiError) -> (u32, String) {
    match err {
        ApiError::InvalidBody(msg) => (20100, msg.clone()),
        ApiError::UnknownSwap => (20101, "unknown payment hash".to_string()),
        ApiError::UnsupportedDirection(dir) => (20102, format!("unsupported direction: {dir}")),
        ApiError::Core(CoreError::Quote(swap_core::error::QuoteError::AmountTooLow {
            amount,
            min,
        })) => (20003, format!("amount {amount} below minimum {min}")),
        ApiError::Core(CoreError::Quote(swap_core::error::QuoteError::AmountTooHigh {
            amount,
            max,
        })) => (20004, format!("amount {amount} above maximum {max}")),
        ApiError::Core(CoreError::ChainAdapter(
            swap_core::error::ChainAdapterError::SignatureVerification,
        )) => (21000, "signature verification failed".to_string()),
        ApiError::Core(e) => (21001, e.to_string()),
        ApiError::Config(e) => (21002, e.to_string()),
        ApiError::Storage(msg) => (21003, msg.clone()),
    }
}
