//! Rate-limited HTTP fetching with retry, backoff, and batch fan-out.

pub mod batch;
pub mod client;
pub mod retry;

pub use batch::{batch_fetch, BatchOptions};
pub use client::{FetchOptions, FetchOutcome, Fetcher};
pub use retry::{retry_with_backoff, RetryPolicy};
