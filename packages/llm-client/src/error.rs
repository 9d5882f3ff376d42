//! Error types for the LLM client.

use thiserror::Error;

/// Result type for LLM client operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// LLM client errors.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response)
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),

    /// The stream stalled past the configured idle timeout
    #[error("stream stalled after {0} ms without a chunk")]
    Stalled(u64),
}

impl LlmError {
    /// HTTP statuses worth retrying: 429, 502, 503.
    pub fn is_retryable_status(&self) -> bool {
        matches!(self, LlmError::Api { status, .. } if matches!(status, 429 | 502 | 503))
    }

    /// Transient transport failures: connection refused, DNS, closed
    /// sockets, aborts, timeouts, and stream stalls.
    pub fn is_retryable_network(&self) -> bool {
        match self {
            LlmError::Stalled(_) => true,
            LlmError::Network(msg) => {
                let msg = msg.to_lowercase();
                ["connection refused", "dns", "socket", "closed", "abort", "timeout", "timed out", "reset"]
                    .iter()
                    .any(|needle| msg.contains(needle))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 502, 503] {
            let err = LlmError::Api { status, body: String::new() };
            assert!(err.is_retryable_status(), "{status} should be retryable");
        }
        for status in [400, 401, 404, 500] {
            let err = LlmError::Api { status, body: String::new() };
            assert!(!err.is_retryable_status(), "{status} should not be retryable");
        }
    }

    #[test]
    fn test_retryable_network() {
        assert!(LlmError::Network("error sending request: connection refused".into()).is_retryable_network());
        assert!(LlmError::Network("dns error: failed to lookup".into()).is_retryable_network());
        assert!(LlmError::Stalled(60_000).is_retryable_network());
        assert!(!LlmError::Parse("bad json".into()).is_retryable_network());
        assert!(!LlmError::Network("certificate invalid".into()).is_retryable_network());
    }
}
