//! Workable-style widget API connector (JSON with per-job detail URLs).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceDef;
use crate::fetch::{FetchOptions, Fetcher};
use crate::types::RawJob;

use super::{fill_template, remote_suffix, title_or_default, Connector, ConnectorResult};

#[derive(Debug, Deserialize)]
struct WidgetResponse {
    #[serde(default)]
    jobs: Vec<Posting>,
}

#[derive(Debug, Deserialize)]
struct Posting {
    #[serde(default)]
    shortcode: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    telecommuting: bool,
    #[serde(default)]
    published_on: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Connector for Workable-style widget APIs.
pub struct WorkableConnector {
    source: String,
}

impl WorkableConnector {
    pub fn new() -> Self {
        Self { source: "workable".to_string() }
    }
}

impl Default for WorkableConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WorkableConnector {
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

        let parsed: WidgetResponse = match serde_json::from_str(&outcome.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ConnectorResult::failed(
                    &self.source,
                    company,
                    format!("malformed widget response: {e}"),
                    outcome.rate_limited,
                )
            }
        };

        let jobs = parsed
            .jobs
            .into_iter()
            .map(|posting| {
                let source_job_id = if posting.shortcode.is_empty() {
                    crate::types::raw::synthetic_job_id(&self.source, company, &posting.title)
                } else {
                    posting.shortcode.clone()
                };

                // Public URL may come back as a slug-only path
                let job_url = if posting.url.starts_with("http") {
                    posting.url.clone()
                } else if let Some(url_template) = def.url_template.as_deref() {
                    fill_template(url_template, &posting.shortcode)
                } else {
                    posting.url.clone()
                };

                let location = [posting.city.as_deref(), posting.country.as_deref()]
                    .into_iter()
                    .flatten()
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ");

                let payload = serde_json::json!({
                    "shortcode": posting.shortcode,
                    "title": posting.title,
                    "url": posting.url,
                })
                .to_string();

                let mut raw = RawJob::new(
                    &self.source,
                    source_job_id,
                    title_or_default(&posting.title),
                    company,
                    job_url,
                )
                .with_location(remote_suffix(&location, posting.telecommuting))
                .with_payload(payload);

                if let Some(description) = posting.description {
                    raw = raw.with_content(description);
                }
                if let Some(published) = posting.published_on {
                    raw = raw.with_posted_at(published);
                }
                raw
            })
            .collect::<Vec<_>>();

        debug!(source = %self.source, company, jobs = jobs.len(), "widget fetched");
        let mut result =
            ConnectorResult::ok(&self.source, company, jobs, outcome.response_time_ms);
        result.rate_limited = outcome.rate_limited;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_joins_city_and_country() {
        let body = r#"{
            "jobs": [
                {
                    "shortcode": "AB12",
                    "title": "Data Engineer",
                    "url": "AB12",
                    "city": "Toronto",
                    "country": "Canada",
                    "telecommuting": true,
                    "published_on": "2026-07-03"
                }
            ]
        }"#;
        let parsed: WidgetResponse = serde_json::from_str(body).unwrap();
        let p = &parsed.jobs[0];

        let location = remote_suffix("Toronto, Canada", p.telecommuting);
        assert_eq!(location, "Toronto, Canada (remote)");
        // Slug-only URL means the template must construct the public link
        assert!(!p.url.starts_with("http"));
    }
}
