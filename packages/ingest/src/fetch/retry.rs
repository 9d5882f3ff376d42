//! Generic retry-with-backoff helper.
//!
//! One policy object shared by the connector fetcher and the fit
//! analyzer: classify the error, compute the wait, bound the attempts.

use std::future::Future;
use std::time::Duration;

/// How an operation should be retried.
pub struct RetryPolicy<E> {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Whether a given error is worth retrying
    pub is_retryable: Box<dyn Fn(&E) -> bool + Send + Sync>,

    /// Wait before retry `attempt` (0-based), given the error that caused
    /// it. Lets callers honor server-provided waits like `Retry-After`.
    pub backoff: Box<dyn Fn(u32, &E) -> Duration + Send + Sync>,
}

impl<E> RetryPolicy<E> {
    /// Exponential backoff: `start · 2^attempt`, retrying every error.
    pub fn exponential(max_retries: u32, start: Duration) -> Self {
        Self {
            max_retries,
            is_retryable: Box::new(|_| true),
            backoff: Box::new(move |attempt, _| start * 2u32.saturating_pow(attempt)),
        }
    }

    /// Linear backoff: `step · (attempt + 1)`, retrying every error.
    pub fn linear(max_retries: u32, step: Duration) -> Self {
        Self {
            max_retries,
            is_retryable: Box::new(|_| true),
            backoff: Box::new(move |attempt, _| step * (attempt + 1)),
        }
    }

    /// Restrict which errors are retried.
    pub fn retry_if(mut self, pred: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.is_retryable = Box::new(pred);
        self
    }

    /// Replace the backoff function.
    pub fn backoff_with(mut self, f: impl Fn(u32, &E) -> Duration + Send + Sync + 'static) -> Self {
        self.backoff = Box::new(f);
        self
    }
}

/// Run `op` until it succeeds, the error is non-retryable, or retries are
/// exhausted. Returns the last error in the failure cases.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy<E>, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !(policy.is_retryable)(&err) {
                    return Err(err);
                }
                let wait = (policy.backoff)(attempt, &err);
                tracing::debug!(
                    attempt = attempt + 1,
                    wait_ms = wait.as_millis() as u64,
                    "retrying after error"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let policy: RetryPolicy<String> = RetryPolicy::exponential(3, Duration::from_millis(1));
        let result = retry_with_backoff(&policy, |_| async { Ok::<_, String>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy: RetryPolicy<String> = RetryPolicy::exponential(3, Duration::from_millis(1));
        let result = retry_with_backoff(&policy, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let policy: RetryPolicy<u16> =
            RetryPolicy::exponential(5, Duration::from_millis(1)).retry_if(|status| *status != 404);
        let result: Result<(), u16> = retry_with_backoff(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(404) }
        })
        .await;
        assert_eq!(result.unwrap_err(), 404);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_retries() {
        let calls = AtomicU32::new(0);
        let policy: RetryPolicy<String> = RetryPolicy::linear(2, Duration::from_millis(1));
        let result: Result<(), String> = retry_with_backoff(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;
        assert!(result.is_err());
        // 1 initial + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
