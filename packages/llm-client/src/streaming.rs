//! SSE streaming parser for chat completions.
//!
//! Converts a raw `reqwest` byte stream into `ChatChunk` values.
//! Handles `data: [DONE]`, partial lines, buffering, and trailing `usage`
//! payloads. Malformed data lines are skipped rather than surfaced as
//! errors; providers occasionally emit keep-alive or vendor-specific lines
//! mid-stream.

use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::LlmError;
use crate::types::Usage;

/// A single chunk from a streaming chat completion.
#[derive(Debug, Clone)]
pub struct ChatChunk {
    /// The text delta for this chunk.
    pub delta: String,
    /// Token usage, reported by some providers in the final chunks.
    pub usage: Option<Usage>,
    /// Whether the stream is done.
    pub done: bool,
}

/// Raw streaming chunk from the API.
#[derive(Debug, serde::Deserialize)]
struct StreamChunkRaw {
    #[serde(default)]
    choices: Vec<StreamChoiceRaw>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, serde::Deserialize)]
struct StreamChoiceRaw {
    delta: DeltaRaw,
}

#[derive(Debug, serde::Deserialize)]
struct DeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

/// Stream adapter that converts raw SSE bytes into `ChatChunk` values.
pub struct ChatCompletionStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: String,
}

impl ChatCompletionStream {
    pub(crate) fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
        }
    }
}

impl Stream for ChatCompletionStream {
    type Item = Result<ChatChunk, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            // Try to parse a complete line from the buffer
            if let Some(chunk) = try_parse_line(&mut this.buffer) {
                return Poll::Ready(Some(Ok(chunk)));
            }

            // Need more data from the byte stream
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    match std::str::from_utf8(&bytes) {
                        Ok(text) => this.buffer.push_str(text),
                        Err(_) => {
                            // Drop bytes that split a UTF-8 sequence; the
                            // lossy remainder would corrupt JSON anyway.
                            this.buffer.push_str(&String::from_utf8_lossy(&bytes));
                        }
                    }
                    // Loop to try parsing again
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(LlmError::Network(e.to_string()))));
                }
                Poll::Ready(None) => {
                    if this.buffer.trim().is_empty() {
                        return Poll::Ready(None);
                    }
                    // Flush any complete trailing line
                    this.buffer.push('\n');
                    if let Some(chunk) = try_parse_line(&mut this.buffer) {
                        return Poll::Ready(Some(Ok(chunk)));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Try to extract and parse a complete SSE data line from the buffer.
/// Returns `None` if no complete, meaningful line is available yet.
fn try_parse_line(buffer: &mut String) -> Option<ChatChunk> {
    loop {
        let newline_pos = buffer.find('\n')?;
        let line = buffer[..newline_pos].trim().to_string();
        buffer.drain(..=newline_pos);

        // SSE uses blank lines as event separators
        if line.is_empty() {
            continue;
        }

        let Some(data) = line.strip_prefix("data:") else {
            // Skip non-data lines ("event:", "id:", "retry:", comments)
            continue;
        };
        let data = data.trim();

        if data == "[DONE]" {
            return Some(ChatChunk { delta: String::new(), usage: None, done: true });
        }

        match serde_json::from_str::<StreamChunkRaw>(data) {
            Ok(raw) => {
                let delta = raw
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .unwrap_or_default();
                return Some(ChatChunk { delta, usage: raw.usage, done: false });
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    data = &data[..data.len().min(120)],
                    "skipping malformed stream chunk"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn make_sse_bytes(lines: &[&str]) -> Vec<Result<Bytes, reqwest::Error>> {
        lines
            .iter()
            .map(|line| Ok(Bytes::from(format!("{}\n", line))))
            .collect()
    }

    async fn collect(lines: &[&str]) -> Vec<ChatChunk> {
        let byte_stream = futures::stream::iter(make_sse_bytes(lines));
        let mut stream = ChatCompletionStream::new(byte_stream);
        let mut chunks = Vec::new();
        while let Some(item) = stream.next().await {
            chunks.push(item.unwrap());
        }
        chunks
    }

    #[tokio::test]
    async fn test_parse_single_chunk() {
        let chunks = collect(&[
            r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
            "",
            "data: [DONE]",
        ])
        .await;

        assert_eq!(chunks[0].delta, "Hello");
        assert!(!chunks[0].done);
        assert!(chunks[1].done);
    }

    #[tokio::test]
    async fn test_assembles_split_json_payload() {
        // A JSON object split across deltas must reassemble byte-exact
        let chunks = collect(&[
            r#"data: {"choices":[{"delta":{"content":"{\"fitScore\":"}}]}"#,
            "",
            r#"data: {"choices":[{"delta":{"content":"87}"}}]}"#,
            "",
            "data: [DONE]",
        ])
        .await;

        let body: String = chunks.iter().map(|c| c.delta.as_str()).collect();
        assert_eq!(body, r#"{"fitScore":87}"#);
    }

    #[tokio::test]
    async fn test_malformed_chunks_skipped() {
        let chunks = collect(&[
            "data: {not json at all",
            r#"data: {"choices":[{"delta":{"content":"ok"}}]}"#,
            "data: [DONE]",
        ])
        .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].delta, "ok");
        assert!(chunks[1].done);
    }

    #[tokio::test]
    async fn test_usage_captured() {
        let chunks = collect(&[
            r#"data: {"choices":[{"delta":{"content":"x"}}]}"#,
            r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
            "data: [DONE]",
        ])
        .await;

        let usage = chunks.iter().find_map(|c| c.usage.clone()).unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
    }

    #[tokio::test]
    async fn test_empty_delta() {
        let chunks = collect(&[r#"data: {"choices":[{"delta":{}}]}"#, "", "data: [DONE]"]).await;
        assert_eq!(chunks[0].delta, "");
    }

    #[tokio::test]
    async fn test_partial_line_buffering() {
        // One data line delivered in two byte chunks
        let data: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from(r#"data: {"choices":[{"delta":{"con"#)),
            Ok(Bytes::from("tent\":\"joined\"}}]}\n")),
            Ok(Bytes::from("data: [DONE]\n")),
        ];
        let mut stream = ChatCompletionStream::new(futures::stream::iter(data));
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.delta, "joined");
    }
}
