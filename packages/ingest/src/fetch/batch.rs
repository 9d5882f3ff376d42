//! Batch fan-out over a fetch function.
//!
//! Items run in slices of `batch_size`. A slice runs fully in parallel
//! unless a minimum request spacing is configured, in which case items in
//! the slice run sequentially with that spacing. One failing item never
//! aborts its siblings; the output always has one entry per input.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Pacing for a batch of fetches.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Items per slice; also the in-flight cap
    pub batch_size: usize,

    /// Minimum spacing between items of a slice; 0 means run the slice in
    /// parallel (the preferred path)
    pub delay_between_requests_ms: u64,

    /// Sleep between slices
    pub batch_pause_ms: u64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay_between_requests_ms: 0,
            batch_pause_ms: 1_000,
        }
    }
}

impl From<&crate::config::RateLimiting> for BatchOptions {
    fn from(rl: &crate::config::RateLimiting) -> Self {
        Self {
            batch_size: rl.batch_size.max(1),
            delay_between_requests_ms: rl.delay_between_requests_ms,
            batch_pause_ms: rl.batch_pause_ms,
        }
    }
}

/// Run `fetch_fn` over every item, slice by slice.
///
/// `on_progress` is called with `(completed, total)` after each slice.
pub async fn batch_fetch<I, T, E, F, Fut, P>(
    items: Vec<I>,
    fetch_fn: F,
    options: &BatchOptions,
    on_progress: P,
) -> Vec<Result<T, E>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(usize, usize),
{
    let total = items.len();
    let batch_size = options.batch_size.max(1);
    let mut results = Vec::with_capacity(total);

    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        let slice: Vec<I> = iter.by_ref().take(batch_size).collect();
        let slice_len = slice.len();

        if options.delay_between_requests_ms == 0 {
            // Parallel slice: wall-clock ≈ slowest item, not the sum
            let futures: Vec<Fut> = slice.into_iter().map(&fetch_fn).collect();
            results.extend(join_all(futures).await);
        } else {
            // Sequential slice with minimum spacing
            let spacing = Duration::from_millis(options.delay_between_requests_ms);
            for (i, item) in slice.into_iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(spacing).await;
                }
                results.push(fetch_fn(item).await);
            }
        }

        debug!(completed = results.len(), total, slice = slice_len, "batch slice done");
        on_progress(results.len(), total);

        if iter.peek().is_some() && options.batch_pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.batch_pause_ms)).await;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_one_result_per_input_with_failures() {
        let options = BatchOptions { batch_size: 3, delay_between_requests_ms: 0, batch_pause_ms: 0 };
        let results = batch_fetch(
            vec![1, 2, 3, 4, 5],
            |n| async move {
                if n == 3 {
                    Err(format!("boom {n}"))
                } else {
                    Ok(n * 10)
                }
            },
            &options,
            |_, _| {},
        )
        .await;

        assert_eq!(results.len(), 5);
        assert_eq!(results[0], Ok(10));
        assert!(results[2].is_err());
        assert_eq!(results[4], Ok(50));
    }

    #[tokio::test]
    async fn test_slice_runs_in_parallel() {
        // 4 items at 50ms each in one slice should take ~50ms, not ~200ms
        let options = BatchOptions { batch_size: 4, delay_between_requests_ms: 0, batch_pause_ms: 0 };
        let start = Instant::now();
        let results = batch_fetch(
            vec![(); 4],
            |_| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, String>(())
            },
            &options,
            |_, _| {},
        )
        .await;
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 4);
        assert!(
            elapsed < Duration::from_millis(150),
            "expected parallel execution, took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_pause_between_slices() {
        let options = BatchOptions { batch_size: 2, delay_between_requests_ms: 0, batch_pause_ms: 40 };
        let start = Instant::now();
        let results =
            batch_fetch(vec![1, 2, 3, 4], |n| async move { Ok::<_, String>(n) }, &options, |_, _| {})
                .await;

        assert_eq!(results.len(), 4);
        // Two slices, one pause
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_sequential_spacing_honored() {
        let options = BatchOptions { batch_size: 3, delay_between_requests_ms: 30, batch_pause_ms: 0 };
        let start = Instant::now();
        batch_fetch(vec![1, 2, 3], |n| async move { Ok::<_, String>(n) }, &options, |_, _| {}).await;
        // Two gaps of 30ms inside the slice
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_progress_reported_per_slice() {
        let options = BatchOptions { batch_size: 2, delay_between_requests_ms: 0, batch_pause_ms: 0 };
        let progress = std::sync::Mutex::new(Vec::new());
        batch_fetch(
            vec![1, 2, 3],
            |n| async move { Ok::<_, String>(n) },
            &options,
            |done, total| progress.lock().unwrap().push((done, total)),
        )
        .await;
        assert_eq!(*progress.lock().unwrap(), vec![(2, 3), (3, 3)]);
    }
}
