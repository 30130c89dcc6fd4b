//! Retry loops driven by exponential backoff
//!
//! Attempts are strictly sequential: the next call starts only after the
//! previous one has failed and its delay has elapsed. On exhaustion the last
//! error is returned inside [`RetryError::Exhausted`] together with the
//! number of calls made.

use super::backoff::{BackoffConfig, ExponentialBackoff};
use crate::error::RetryError;
use std::future::Future;
use std::thread;
use tracing::{debug, warn};

/// Call `f` until it succeeds or the backoff runs out, sleeping the calling
/// thread between attempts
///
/// The loop cannot be cancelled and runs until success or exhaustion. With
/// `max_retries: None` it only stops on success. Use
/// [`retry_with_backoff_async`] to bound the loop with a deadline.
pub fn retry_with_backoff<T, E, F>(mut f: F, config: BackoffConfig) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Result<T, E>,
    E: std::error::Error + 'static,
{
    let mut backoff = ExponentialBackoff::new(config);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let error = match f() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        match backoff.next_delay() {
            Some(delay) => {
                debug!(
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );
                thread::sleep(delay);
            }
            None => {
                warn!(attempts, error = %error, "Retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts,
                    source: error,
                });
            }
        }
    }
}

/// Async variant of [`retry_with_backoff`] that stops when `cancel` completes
///
/// Both the in-flight call and the wait between attempts race `cancel`.
/// Pass a timer such as `tokio::time::sleep_until(deadline)` to bound the
/// whole loop, or any other future to cancel it from elsewhere.
pub async fn retry_with_backoff_async<T, E, F, Fut, C>(
    mut f: F,
    config: BackoffConfig,
    cancel: C,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Future<Output = ()>,
    E: std::error::Error + 'static,
{
    tokio::pin!(cancel);
    let mut backoff = ExponentialBackoff::new(config);
    let mut attempts = 0u32;
    let mut last_error: Option<E> = None;

    loop {
        attempts += 1;
        let outcome = tokio::select! {
            biased;
            _ = &mut cancel => None,
            result = f() => Some(result),
        };

        let error = match outcome {
            Some(Ok(value)) => return Ok(value),
            Some(Err(e)) => e,
            None => {
                debug!(attempts, "Retry cancelled during call");
                return Err(RetryError::Cancelled { attempts, last_error });
            }
        };

        let Some(delay) = backoff.next_delay() else {
            warn!(attempts, error = %error, "Retries exhausted");
            return Err(RetryError::Exhausted {
                attempts,
                source: error,
            });
        };

        debug!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );
        last_error = Some(error);

        tokio::select! {
            biased;
            _ = &mut cancel => {
                debug!(attempts, "Retry cancelled during backoff");
                return Err(RetryError::Cancelled { attempts, last_error });
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
