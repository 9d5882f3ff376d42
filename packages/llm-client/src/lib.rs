//! Minimal OpenAI-compatible chat completions client.
//!
//! A clean client for chat-completions-style endpoints with no
//! domain-specific logic. Supports blocking completions and SSE streaming.
//! Works against any provider that speaks the `/chat/completions` wire
//! format (hosted open-weight models, proxies, OpenAI itself).
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_client::{ChatRequest, LlmClient, Message};
//!
//! let client = LlmClient::new("sk-...").with_base_url("https://llm.example.com/v1");
//!
//! let response = client
//!     .chat_completion(
//!         ChatRequest::new("qwen-72b")
//!             .message(Message::user("Hello!"))
//!             .temperature(0.3),
//!     )
//!     .await?;
//! ```

pub mod error;
pub mod streaming;
pub mod types;

pub use error::{LlmError, Result};
pub use streaming::{ChatChunk, ChatCompletionStream};
pub use types::*;

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Chat completions API client.
#[derive(Clone)]
pub struct LlmClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Set a custom base URL (self-hosted endpoints, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set a request deadline on the underlying HTTP client.
    ///
    /// This bounds the whole request including body/stream reads; streaming
    /// callers usually prefer their own stall detection and pass a generous
    /// hard cap here.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client with timeout");
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Blocking (non-streaming) chat completion.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat completion request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "chat completion API error");
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        let raw: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("response contained no choices".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "chat completion"
        );

        Ok(ChatResponse { content, usage: raw.usage })
    }

    /// Streaming chat completion.
    ///
    /// Sends the request with `stream: true` and returns a stream of token
    /// chunks decoded from the SSE response.
    pub async fn chat_completion_stream(&self, request: ChatRequest) -> Result<ChatCompletionStream> {
        let mut body = serde_json::to_value(&request)
            .map_err(|e| LlmError::Parse(format!("failed to serialize request: {e}")))?;
        body["stream"] = serde_json::Value::Bool(true);
        // Ask compatible providers to report usage in the final chunk
        body["stream_options"] = serde_json::json!({ "include_usage": true });

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "streaming request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "streaming API error");
            return Err(LlmError::Api { status: status.as_u16(), body });
        }

        Ok(ChatCompletionStream::new(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = LlmClient::new("sk-test").with_base_url("https://custom.api.com/v1");
        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url(), "https://custom.api.com/v1");
    }
}
