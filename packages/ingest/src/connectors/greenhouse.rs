//! Greenhouse-style board API connector (JSON jobs array with ids).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceDef;
use crate::fetch::{FetchOptions, Fetcher};
use crate::normalize::hash::decode_entities;
use crate::types::RawJob;

use super::{fill_template, title_or_default, Connector, ConnectorResult};

#[derive(Debug, Deserialize)]
struct BoardResponse {
    #[serde(default)]
    jobs: Vec<Posting>,
}

#[derive(Debug, Deserialize)]
struct Posting {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    absolute_url: String,
    #[serde(default)]
    location: Option<Location>,
    /// HTML body, entity-escaped by the API
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    first_published: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    name: String,
}

/// Connector for Greenhouse-style board APIs.
pub struct GreenhouseConnector {
    source: String,
}

impl GreenhouseConnector {
    pub fn new() -> Self {
        Self { source: "greenhouse".to_string() }
    }
}

impl Default for GreenhouseConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for GreenhouseConnector {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self, fetcher: &Fetcher, company: &str, def: &SourceDef) -> ConnectorResult {
        let template = match def.require_endpoint_template(&self.source) {
            Ok(t) => t,
            Err(e) => return ConnectorResult::failed(&self.source, company, e.to_string(), false),
        };
        let url = fill_template(template, company);
        let options = FetchOptions::default()
            .with_timeout_ms(def.timeout_ms)
            .with_max_retries(def.max_retries);

        let outcome = match fetcher.fetch(&url, &options).await {
            Ok(outcome) => outcome,
            Err(e) => return ConnectorResult::from_fetch_error(&self.source, company, &e),
        };

        let parsed: BoardResponse = match serde_json::from_str(&outcome.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ConnectorResult::failed(
                    &self.source,
                    company,
                    format!("malformed board response: {e}"),
                    outcome.rate_limited,
                )
            }
        };

        let jobs = parsed
            .jobs
            .into_iter()
            .map(|posting| {
                let payload = serde_json::json!({
                    "id": posting.id,
                    "title": posting.title,
                    "absolute_url": posting.absolute_url,
                })
                .to_string();

                let mut raw = RawJob::new(
                    &self.source,
                    posting.id.to_string(),
                    title_or_default(&posting.title),
                    company,
                    posting.absolute_url,
                )
                .with_payload(payload);

                if let Some(location) = posting.location {
                    raw = raw.with_location(location.name);
                }
                if let Some(content) = posting.content {
                    raw = raw.with_content(decode_entities(&content));
                }
                if let Some(posted) = posting.first_published.or(posting.updated_at) {
                    raw = raw.with_posted_at(posted);
                }
                raw
            })
            .collect::<Vec<_>>();

        debug!(source = %self.source, company, jobs = jobs.len(), "board fetched");
        let mut result =
            ConnectorResult::ok(&self.source, company, jobs, outcome.response_time_ms);
        result.rate_limited = outcome.rate_limited;
        result
    }
}
