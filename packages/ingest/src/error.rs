//! Typed errors for the ingestion engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur during ingestion operations.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Fetch operation failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Connector configuration is invalid (missing URL template etc.)
    #[error("connector config error for {source_name}: {reason}")]
    ConnectorConfig { source_name: String, reason: String },

    /// A source payload could not be parsed
    #[error("parse error from {source_name}: {reason}")]
    SourceParse { source_name: String, reason: String },

    /// Rules config file failed to load
    #[error("config error: {0}")]
    Config(String),

    /// Fit analyzer failed
    #[error("analyzer error: {0}")]
    Analyzer(#[from] llm_client::LlmError),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Errors that can occur while fetching from a source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed at the transport level
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-retryable HTTP status (4xx other than 429)
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// Retries exhausted
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: String,
        rate_limited: bool,
    },

    /// Invalid URL
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Deadline exceeded
    #[error("timeout fetching {url}")]
    Timeout { url: String },
}

impl FetchError {
    /// Whether the failure involved hitting a rate limit.
    pub fn was_rate_limited(&self) -> bool {
        match self {
            FetchError::RetriesExhausted { rate_limited, .. } => *rate_limited,
            FetchError::Status { status, .. } => *status == 429,
            _ => false,
        }
    }
}

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row failed to decode into its domain type
    #[error("row decode error: {0}")]
    Decode(String),

    /// Migration failed; the transaction was rolled back
    #[error("migration {id} failed: {reason}")]
    Migration { id: String, reason: String },
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
