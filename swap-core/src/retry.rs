//! `try_with_retries`: bounded exponential backoff that respects
//! cancellation and short-circuits on non-retryable errors (§5).

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{is_non_retryable, CoreError};

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            exponential: true,
        }
    }
}

/// Runs `f` up to `policy.max_attempts` times, backing off between
/// attempts. Returns immediately on an error for which
/// [`is_non_retryable`] holds (e.g. `SignatureVerificationError`), or when
/// `cancel` resolves first.
pub async fn try_with_retries<F, Fut, T>(
    mut f: F,
    policy: RetryPolicy,
    cancel: impl Future<Output = ()>,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    tokio::pin!(cancel);
    let mut delay = policy.initial_delay;

    for attempt in 1..=policy.max_attempts {
        let op = f();
        tokio::pin!(op);

        tokio::select! {
            biased;
            _ = &mut cancel => {
                return Err(CoreError::Quote(crate::error::QuoteError::Aborted));
            }
            result = &mut op => {
                match result {
                    Ok(v) => return Ok(v),
                    Err(e) if is_non_retryable(&e) => {
                        debug!(attempt, "non-retryable error, giving up: {e}");
                        return Err(e);
                    }
                    Err(e) if attempt == policy.max_attempts => {
                        return Err(e);
                    }
                    Err(e) => {
                        debug!(attempt, delay_ms = delay.as_millis(), "retrying after error: {e}");
                        tokio::select! {
                            biased;
                            _ = &mut cancel => {
                                return Err(CoreError::Quote(crate::error::QuoteError::Aborted));
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                        if policy.exponential {
                            delay *= 2;
                        }
                    }
                }
            }
        }
    }

    unreachable!("loop always returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuoteError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts2 = attempts.clone();
        let result = try_with_retries(
            move || {
                let attempts = attempts2.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(CoreError::Other("transient".into()))
                    } else {
                        Ok(42)
                    }
                }
            },
            RetryPolicy {
                max_attempts: 5,
                initial_delay: Duration::from_millis(1),
                exponential: false,
            },
            std::future::pending(),
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_short_circuits() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts2 = attempts.clone();
        let result: Result<(), CoreError> = try_with_retries(
            move || {
                let attempts = attempts2.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::Quote(QuoteError::Aborted))
                }
            },
            RetryPolicy::default(),
            std::future::pending(),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
