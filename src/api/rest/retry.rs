use std::future::Future;

use tokio::time::sleep;
use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::AppError;

/// Runs `call`, retrying with exponential backoff while the store reports
/// `StorageUnavailable`. Every other outcome is returned as-is.
pub async fn with_storage_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt: u32 = 1;

    loop {
        match call().await {
            Err(AppError::StorageUnavailable(reason)) if attempt < attempts => {
                let backoff = policy
                    .base_backoff
                    .saturating_mul(2u32.saturating_pow(attempt - 1));
                warn!(
                    operation,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    reason = %reason,
                    "storage unavailable; retrying"
                );
                sleep(backoff).await;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}
