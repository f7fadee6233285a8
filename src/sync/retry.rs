use crate::error::{Result, SyncError};
use std::future::Future;
use std::time::Duration;

/// Run `op` up to `retries + 1` times with a fixed delay between attempts.
///
/// Only the last attempt's error is returned.
pub async fn retry_with_delay<F, Fut, T>(
    operation: &str,
    retries: u32,
    delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < retries => {
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    retries,
                    error = %err,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                tracing::error!(operation, error = %err, "Operation failed");
                return Err(err);
            }
        }
    }
}

/// Run blocking filesystem work off the async runtime.
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e)))?
}

/// Bound a share call by the connection timeout.
pub async fn with_timeout<T>(
    operation: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        SyncError::ShareAccess(format!("{} timed out after {:?}", operation, limit))
    })?
}
