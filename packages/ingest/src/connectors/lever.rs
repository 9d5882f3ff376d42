//! Lever-style posting API connector (flat JSON posting array).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceDef;
use crate::fetch::{FetchOptions, Fetcher};
use crate::types::RawJob;

use super::{fill_template, remote_suffix, title_or_default, Connector, ConnectorResult};

#[derive(Debug, Deserialize)]
struct Posting {
    #[serde(default)]
    id: String,
    /// Posting title
    #[serde(default)]
    text: String,
    #[serde(default, rename = "hostedUrl")]
    hosted_url: String,
    #[serde(default)]
    categories: Categories,
    /// Epoch milliseconds
    #[serde(default, rename = "createdAt")]
    created_at: Option<i64>,
    #[serde(default, rename = "descriptionPlain")]
    description_plain: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "workplaceType")]
    workplace_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Categories {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    commitment: Option<String>,
}

/// Connector for Lever-style posting APIs.
pub struct LeverConnector {
    source: String,
}

impl LeverConnector {
    pub fn new() -> Self {
        Self { source: "lever".to_string() }
    }
}

impl Default for LeverConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for LeverConnector {
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

        let postings: Vec<Posting> = match serde_json::from_str(&outcome.body) {
            Ok(postings) => postings,
            Err(e) => {
                return ConnectorResult::failed(
                    &self.source,
                    company,
                    format!("malformed posting array: {e}"),
                    outcome.rate_limited,
                )
            }
        };

        let jobs = postings
            .into_iter()
            .map(|posting| {
                let source_job_id = if posting.id.is_empty() {
                    crate::types::raw::synthetic_job_id(&self.source, company, &posting.text)
                } else {
                    posting.id.clone()
                };

                let is_remote = posting
                    .workplace_type
                    .as_deref()
                    .map(|w| w.eq_ignore_ascii_case("remote"))
                    .unwrap_or(false);
                let location = posting.categories.location.clone().unwrap_or_default();

                let payload = serde_json::json!({
                    "id": posting.id,
                    "text": posting.text,
                    "hostedUrl": posting.hosted_url,
                    "commitment": posting.categories.commitment,
                })
                .to_string();

                let mut raw = RawJob::new(
                    &self.source,
                    source_job_id,
                    title_or_default(&posting.text),
                    company,
                    posting.hosted_url,
                )
                .with_location(remote_suffix(&location, is_remote))
                .with_payload(payload);

                // Plaintext body preferred over HTML
                if let Some(content) = posting.description_plain.or(posting.description) {
                    raw = raw.with_content(content);
                }
                if let Some(created_at) = posting.created_at {
                    raw = raw.with_posted_at(created_at.to_string());
                }
                raw
            })
            .collect::<Vec<_>>();

        debug!(source = %self.source, company, jobs = jobs.len(), "postings fetched");
        let mut result =
            ConnectorResult::ok(&self.source, company, jobs, outcome.response_time_ms);
        result.rate_limited = outcome.rate_limited;
        result
    }
}
