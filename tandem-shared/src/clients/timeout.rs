use std::future::Future;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

/// Bounds an I/O call so a stalled dependency cannot hold a worker.
///
/// Elapsed deadlines surface as `ServiceUnavailable`, which callers may retry.
pub async fn with_timeout<T, F>(what: &'static str, limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation = what, timeout_ms = limit.as_millis() as u64, "dependency call timed out");
            Err(AppError::unavailable(format!("{what} timed out")))
        }
    }
}
