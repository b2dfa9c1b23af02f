use crate::types::RetryConfig;
use crate::{MlolError, Result};
use std::future::Future;
use std::time::Duration;

/// Result of a retry operation with context
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The successful result
    pub result: T,
    /// Number of retry attempts made
    pub attempts_made: u32,
    /// Total time spent waiting between attempts
    pub total_retry_time: Duration,
}

/// Execute an async operation, retrying it when it fails with a retryable status.
///
/// Only [`MlolError::Status`] errors whose status is in the config's retry set are
/// retried, with exponential backoff between attempts. Every other error is
/// returned immediately, as is the last status error once `max_attempts` is used up.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name of the operation for logging
/// * `operation` - Async function that returns a Result
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    let mut total_retry_time = Duration::ZERO;

    loop {
        match operation().await {
            Ok(result) => {
                return Ok(RetryResult {
                    result,
                    attempts_made: retries,
                    total_retry_time,
                });
            }
            Err(MlolError::Status { status, url }) if config.is_retryable(status) => {
                if retries + 1 >= config.max_attempts {
                    log::warn!(
                        "Max attempts ({}) exceeded for {operation_name}: last status {status}",
                        config.max_attempts
                    );
                    return Err(MlolError::Status { status, url });
                }

                retries += 1;
                let delay = config.delay_for_retry(retries);
                log::info!(
                    "{operation_name} answered {status}. Waiting {delay:?} before attempt {} of {}",
                    retries + 1,
                    config.max_attempts
                );

                tokio::time::sleep(delay).await;
                total_retry_time += delay;
            }
            Err(other_error) => {
                return Err(other_error);
            }
        }
    }
}
