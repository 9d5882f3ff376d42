//! Rate-limited HTTP fetcher with retry and backoff.
//!
//! Wraps `reqwest` with the retry classification every connector needs:
//! 429 honors `Retry-After`, 5xx and transport errors back off
//! exponentially, other 4xx fail immediately. Header and body reads share
//! one deadline. An optional `governor` quota limits request rate.

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Options for a single fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Deadline covering headers and body for each attempt
    pub timeout: Duration,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// First backoff step; doubles per attempt
    pub backoff_start: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 3,
            backoff_start: Duration::from_millis(1_000),
        }
    }
}

impl FetchOptions {
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Response body
    pub body: String,

    /// Final HTTP status
    pub status_code: u16,

    /// Whether any attempt hit a 429
    pub rate_limited: bool,

    /// Elapsed time of the successful attempt
    pub response_time_ms: u64,
}

/// HTTP fetcher shared by all connectors.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    limiter: Option<Arc<DefaultRateLimiter>>,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    /// Create a fetcher with a browser-like user agent.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("reqwest client");
        Self { client, limiter: None }
    }

    /// Cap sustained request rate.
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        );
        self.limiter = Some(Arc::new(RateLimiter::direct(quota)));
        self
    }

    /// Use a custom reqwest client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// GET a URL with retry/backoff per the options.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<FetchOutcome> {
        self.fetch_inner(url, None, options).await
    }

    /// POST a JSON body with the same retry/backoff behavior.
    pub async fn fetch_json_post(
        &self,
        url: &str,
        body: &serde_json::Value,
        options: &FetchOptions,
    ) -> FetchResult<FetchOutcome> {
        self.fetch_inner(url, Some(body), options).await
    }

    async fn fetch_inner(
        &self,
        url: &str,
        json_body: Option<&serde_json::Value>,
        options: &FetchOptions,
    ) -> FetchResult<FetchOutcome> {
        let mut rate_limited = false;
        let mut last_error = String::new();

        for attempt in 0..=options.max_retries {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let started = Instant::now();
            match self.attempt(url, json_body, options.timeout).await {
                Ok(AttemptOutcome::Success { status, body }) => {
                    return Ok(FetchOutcome {
                        body,
                        status_code: status,
                        rate_limited,
                        response_time_ms: started.elapsed().as_millis() as u64,
                    });
                }
                Ok(AttemptOutcome::RateLimited { retry_after }) => {
                    rate_limited = true;
                    last_error = "HTTP 429".to_string();
                    if attempt < options.max_retries {
                        let wait = retry_after
                            .unwrap_or_else(|| options.backoff_start * 2u32.saturating_pow(attempt));
                        debug!(url = %url, wait_ms = wait.as_millis() as u64, "rate limited, backing off");
                        tokio::time::sleep(wait).await;
                    }
                }
                Ok(AttemptOutcome::ServerError { status }) => {
                    last_error = format!("HTTP {status}");
                    if attempt < options.max_retries {
                        let wait = options.backoff_start * 2u32.saturating_pow(attempt);
                        debug!(url = %url, status, wait_ms = wait.as_millis() as u64, "server error, backing off");
                        tokio::time::sleep(wait).await;
                    }
                }
                Ok(AttemptOutcome::ClientError { status }) => {
                    // 4xx other than 429: not worth retrying
                    return Err(FetchError::Status { status, url: url.to_string() });
                }
                Err(e) => {
                    // Transport failures and timeouts retry like 5xx
                    last_error = e;
                    if attempt < options.max_retries {
                        let wait = options.backoff_start * 2u32.saturating_pow(attempt);
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        warn!(url = %url, attempts = options.max_retries + 1, error = %last_error, "fetch failed");
        Err(FetchError::RetriesExhausted {
            attempts: options.max_retries + 1,
            last_error,
            rate_limited,
        })
    }

    /// One attempt: headers and body share the deadline.
    async fn attempt(
        &self,
        url: &str,
        json_body: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<AttemptOutcome, String> {
        let request = match json_body {
            Some(body) => self.client.post(url).json(body),
            None => self.client.get(url),
        };

        let work = async {
            let response = request.send().await.map_err(|e| e.to_string())?;
            let status = response.status();

            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                return Ok(AttemptOutcome::RateLimited { retry_after });
            }
            if status.is_server_error() {
                return Ok(AttemptOutcome::ServerError { status: status.as_u16() });
            }
            if status.is_client_error() {
                return Ok(AttemptOutcome::ClientError { status: status.as_u16() });
            }

            let body = response.text().await.map_err(|e| e.to_string())?;
            Ok(AttemptOutcome::Success { status: status.as_u16(), body })
        };

        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(format!("timeout after {} ms", timeout.as_millis())),
        }
    }
}

enum AttemptOutcome {
    Success { status: u16, body: String },
    RateLimited { retry_after: Option<Duration> },
    ServerError { status: u16 },
    ClientError { status: u16 },
}
