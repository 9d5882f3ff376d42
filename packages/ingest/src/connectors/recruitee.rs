//! Recruitee-style offers API connector (JSON offers array, HTML bodies).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceDef;
use crate::fetch::{FetchOptions, Fetcher};
use crate::types::RawJob;

use super::{fill_template, title_or_default, Connector, ConnectorResult};

#[derive(Debug, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    offers: Vec<Offer>,
}

#[derive(Debug, Deserialize)]
struct Offer {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    careers_url: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    remote: bool,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Connector for Recruitee-style offers APIs.
pub struct RecruiteeConnector {
    source: String,
}

impl RecruiteeConnector {
    pub fn new() -> Self {
        Self { source: "recruitee".to_string() }
    }
}

impl Default for RecruiteeConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for RecruiteeConnector {
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

        let parsed: OffersResponse = match serde_json::from_str(&outcome.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ConnectorResult::failed(
                    &self.source,
                    company,
                    format!("malformed offers response: {e}"),
                    outcome.rate_limited,
                )
            }
        };

        let jobs = parsed
            .offers
            .into_iter()
            .map(|offer| {
                let location = offer
                    .location
                    .clone()
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| {
                        [offer.city.as_deref(), offer.country.as_deref()]
                            .into_iter()
                            .flatten()
                            .filter(|part| !part.is_empty())
                            .collect::<Vec<_>>()
                            .join(", ")
                    });

                let payload = serde_json::json!({
                    "id": offer.id,
                    "title": offer.title,
                    "careers_url": offer.careers_url,
                })
                .to_string();

                let mut raw = RawJob::new(
                    &self.source,
                    offer.id.to_string(),
                    title_or_default(&offer.title),
                    company,
                    offer.careers_url,
                )
                .with_location(super::remote_suffix(&location, offer.remote))
                .with_payload(payload);

                if let Some(description) = offer.description {
                    raw = raw.with_content(description);
                }
                if let Some(created_at) = offer.created_at {
                    raw = raw.with_posted_at(created_at);
                }
                raw
            })
            .collect::<Vec<_>>();

        debug!(source = %self.source, company, jobs = jobs.len(), "offers fetched");
        let mut result =
            ConnectorResult::ok(&self.source, company, jobs, outcome.response_time_ms);
        result.rate_limited = outcome.rate_limited;
        result
    }
}
