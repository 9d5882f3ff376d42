//! Web-search API client with a rotating key pool.
//!
//! Used by board discovery and the search-based connectors. Keys rotate
//! round-robin per request; an empty key list disables every caller.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::{FetchError, FetchResult};

/// One search result.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchItem>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
}

/// Search API client. Cheap to clone; the key cursor is shared.
#[derive(Clone)]
pub struct SearchApiClient {
    client: reqwest::Client,
    endpoint: String,
    api_keys: Arc<Vec<String>>,
    cursor: Arc<AtomicUsize>,
}

impl SearchApiClient {
    pub fn new(endpoint: impl Into<String>, api_keys: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .expect("reqwest client"),
            endpoint: endpoint.into(),
            api_keys: Arc::new(api_keys),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether any API keys are configured. Discovery and the search
    /// connectors are disabled when this is false.
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    fn next_key(&self) -> Option<&str> {
        if self.api_keys.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.api_keys.len();
        Some(&self.api_keys[index])
    }

    /// Run one query, returning up to `max_results` items.
    pub async fn search(&self, query: &str, max_results: usize) -> FetchResult<Vec<SearchItem>> {
        let Some(key) = self.next_key() else {
            return Ok(Vec::new());
        };

        let request = SearchRequest { query, max_results };
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {key}"))
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, query, "search API error");
            return Err(FetchError::Status { status: status.as_u16(), url: self.endpoint.clone() });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Http(format!("malformed search response: {e}")))?;
        Ok(parsed.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_rotation_round_robin() {
        let client =
            SearchApiClient::new("https://search.example.com/v1", vec!["k1".into(), "k2".into()]);
        assert_eq!(client.next_key(), Some("k1"));
        assert_eq!(client.next_key(), Some("k2"));
        assert_eq!(client.next_key(), Some("k1"));
    }

    #[test]
    fn test_empty_keys_disable_client() {
        let client = SearchApiClient::new("https://search.example.com/v1", vec![]);
        assert!(!client.is_enabled());
        assert_eq!(client.next_key(), None);
    }

    #[test]
    fn test_parses_results() {
        let body = r#"{"results": [{"title": "Engineer at Acme", "link": "https://a.com/jobs/1", "snippet": "2 days ago - build"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].title, "Engineer at Acme");
    }
}
