//! Ashby-style POST job-board connector (paginated offset/limit JSON body).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceDef;
use crate::fetch::{FetchOptions, Fetcher};
use crate::types::RawJob;

use super::{fill_template, remote_suffix, title_or_default, Connector, ConnectorResult};

const PAGE_SIZE: usize = 50;
const MAX_PAGES: usize = 20;

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    jobs: Vec<Posting>,
}

#[derive(Debug, Deserialize)]
struct Posting {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "jobUrl")]
    job_url: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default, rename = "isRemote")]
    is_remote: bool,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default, rename = "descriptionHtml")]
    description_html: Option<String>,
}

/// Connector for Ashby-style POST job-board endpoints.
pub struct AshbyConnector {
    source: String,
}

impl AshbyConnector {
    pub fn new() -> Self {
        Self { source: "ashby".to_string() }
    }
}

impl Default for AshbyConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for AshbyConnector {
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

        let mut jobs = Vec::new();
        let mut rate_limited = false;
        let mut response_time_ms = 0u64;

        for page in 0..MAX_PAGES {
            let body = serde_json::json!({
                "offset": page * PAGE_SIZE,
                "limit": PAGE_SIZE,
            });

            let outcome = match fetcher.fetch_json_post(&url, &body, &options).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Keep whatever earlier pages yielded only if none did;
                    // a partial board reads as a failed poll
                    return ConnectorResult::from_fetch_error(&self.source, company, &e);
                }
            };
            rate_limited |= outcome.rate_limited;
            response_time_ms += outcome.response_time_ms;

            let parsed: PageResponse = match serde_json::from_str(&outcome.body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    return ConnectorResult::failed(
                        &self.source,
                        company,
                        format!("malformed page response: {e}"),
                        rate_limited,
                    )
                }
            };

            let page_len = parsed.jobs.len();
            jobs.extend(parsed.jobs.into_iter().map(|posting| self.to_raw(company, posting)));

            if page_len < PAGE_SIZE {
                break;
            }
        }

        debug!(source = %self.source, company, jobs = jobs.len(), "paginated board fetched");
        let mut result = ConnectorResult::ok(&self.source, company, jobs, response_time_ms);
        result.rate_limited = rate_limited;
        result
    }
}

impl AshbyConnector {
    fn to_raw(&self, company: &str, posting: Posting) -> RawJob {
        let source_job_id = if posting.id.is_empty() {
            crate::types::raw::synthetic_job_id(&self.source, company, &posting.title)
        } else {
            posting.id.clone()
        };

        let payload = serde_json::json!({
            "id": posting.id,
            "title": posting.title,
            "jobUrl": posting.job_url,
            "isRemote": posting.is_remote,
        })
        .to_string();

        let location = posting.location.unwrap_or_default();
        let mut raw = RawJob::new(
            &self.source,
            source_job_id,
            title_or_default(&posting.title),
            company,
            posting.job_url,
        )
        .with_location(remote_suffix(&location, posting.is_remote))
        .with_payload(payload);

        if let Some(html) = posting.description_html {
            raw = raw.with_content(html);
        }
        if let Some(published) = posting.published_at {
            raw = raw.with_posted_at(published);
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_page_and_maps_remote() {
        let body = r#"{
            "jobs": [
                {
                    "id": "uuid-1",
                    "title": "Platform Engineer",
                    "jobUrl": "https://jobs.example.com/acme/uuid-1",
                    "location": "Toronto",
                    "isRemote": true,
                    "publishedAt": "2026-07-02T12:00:00Z",
                    "descriptionHtml": "<p>Infra.</p>"
                }
            ]
        }"#;
        let parsed: PageResponse = serde_json::from_str(body).unwrap();
        let raw = AshbyConnector::new().to_raw("acme", parsed.jobs.into_iter().next().unwrap());

        assert_eq!(raw.source_job_id, "uuid-1");
        assert_eq!(raw.location_raw, "Toronto (remote)");
        assert_eq!(raw.posted_at.as_deref(), Some("2026-07-02T12:00:00Z"));
        assert!(raw.content.contains("Infra"));
    }

    #[test]
    fn test_short_page_ends_pagination() {
        // A page with fewer than PAGE_SIZE entries is the last one
        let parsed: PageResponse = serde_json::from_str(r#"{"jobs": []}"#).unwrap();
        assert!(parsed.jobs.len() < PAGE_SIZE);
    }
}
