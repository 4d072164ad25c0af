use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry an operation on transient connection errors.
///
/// Non-retryable errors, and the error of the last attempt, are returned as-is.
pub async fn retry_with_max_retries<F, Fut, T, E>(
    max_retries: usize,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + Send + Sync,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) || attempt >= max_retries {
                    return Err(e);
                }

                warn!(
                    "Retryable error in {} (attempt {}/{}): {:?}",
                    operation_name,
                    attempt + 1,
                    max_retries,
                    e
                );

                // Exponential backoff: 100ms, 200ms, 400ms, 800ms, 1600ms, ...
                let backoff_ms = 100 * (1u64 << attempt.min(10));
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
        }
    }
}

fn is_retryable<E: Error>(e: &E) -> bool {
    let error_msg = format!("{:?}", e);
    error_msg.contains("ConnectionReset")
        || error_msg.contains("BrokenPipe")
        || error_msg.contains("Interrupted")
        || error_msg.contains("TimedOut")
}
