//! Source connectors: per-platform adapters with a uniform result shape.
//!
//! A connector turns one company's board on one platform into a list of
//! `RawJob`s. Failures never propagate as errors past the connector; they
//! come back as failure-marked results so one bad board cannot take down
//! a run.

pub mod ashby;
pub mod greenhouse;
pub mod html;
pub mod lever;
pub mod recruitee;
pub mod search;
pub mod workable;

pub use ashby::AshbyConnector;
pub use greenhouse::GreenhouseConnector;
pub use html::HtmlConnector;
pub use lever::LeverConnector;
pub use recruitee::RecruiteeConnector;
pub use search::SearchConnector;
pub use workable::WorkableConnector;

use async_trait::async_trait;

use crate::config::{SourceDef, SourceType};
use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::types::RawJob;

/// Uniform result of polling one company on one source.
#[derive(Debug, Clone)]
pub struct ConnectorResult {
    pub source: String,
    pub company: String,
    pub jobs: Vec<RawJob>,
    pub success: bool,
    pub error: Option<String>,
    pub rate_limited: bool,
    pub response_time_ms: u64,
}

impl ConnectorResult {
    pub fn ok(
        source: impl Into<String>,
        company: impl Into<String>,
        jobs: Vec<RawJob>,
        response_time_ms: u64,
    ) -> Self {
        Self {
            source: source.into(),
            company: company.into(),
            jobs,
            success: true,
            error: None,
            rate_limited: false,
            response_time_ms,
        }
    }

    pub fn failed(
        source: impl Into<String>,
        company: impl Into<String>,
        error: impl Into<String>,
        rate_limited: bool,
    ) -> Self {
        Self {
            source: source.into(),
            company: company.into(),
            jobs: Vec::new(),
            success: false,
            error: Some(error.into()),
            rate_limited,
            response_time_ms: 0,
        }
    }

    pub fn from_fetch_error(
        source: impl Into<String>,
        company: impl Into<String>,
        error: &FetchError,
    ) -> Self {
        Self::failed(source, company, error.to_string(), error.was_rate_limited())
    }
}

/// A per-platform adapter.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Source name, used for metrics and board matching.
    fn source(&self) -> &str;

    /// Poll one company's board.
    async fn fetch(&self, fetcher: &Fetcher, company: &str, def: &SourceDef) -> ConnectorResult;
}

/// Fill `{slug}` (and `{company}`) placeholders in a URL template.
pub fn fill_template(template: &str, slug: &str) -> String {
    template.replace("{slug}", slug).replace("{company}", slug)
}

/// Pick the connector implementation for a configured source.
///
/// API sources are matched by name; any HTML-typed source shares the
/// selector-driven page parser. Search sources are driven separately by
/// the pipeline (they take queries, not companies).
pub fn connector_for(name: &str, def: &SourceDef) -> Option<Box<dyn Connector>> {
    match def.source_type {
        SourceType::Api => match name {
            "greenhouse" => Some(Box::new(GreenhouseConnector::new())),
            "lever" => Some(Box::new(LeverConnector::new())),
            "ashby" => Some(Box::new(AshbyConnector::new())),
            "workable" => Some(Box::new(WorkableConnector::new())),
            "recruitee" => Some(Box::new(RecruiteeConnector::new())),
            _ => None,
        },
        SourceType::Html => Some(Box::new(HtmlConnector::new(name))),
        SourceType::Search => None,
    }
}

/// Default title for postings whose source reports an empty one.
pub(crate) fn title_or_default(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        "Untitled Role".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Suffix a location with `" (remote)"` when the posting is remote-tagged
/// but its free-text location does not already say so.
pub(crate) fn remote_suffix(location: &str, is_remote: bool) -> String {
    if is_remote && !location.to_lowercase().contains("remote") {
        if location.is_empty() {
            "(remote)".to_string()
        } else {
            format!("{location} (remote)")
        }
    } else {
        location.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template() {
        assert_eq!(
            fill_template("https://api.lever.co/v0/postings/{slug}?mode=json", "acme"),
            "https://api.lever.co/v0/postings/acme?mode=json"
        );
    }

    #[test]
    fn test_title_or_default() {
        assert_eq!(title_or_default("  Engineer "), "Engineer");
        assert_eq!(title_or_default("   "), "Untitled Role");
    }

    #[test]
    fn test_remote_suffix() {
        assert_eq!(remote_suffix("Toronto, ON", true), "Toronto, ON (remote)");
        assert_eq!(remote_suffix("Remote - Canada", true), "Remote - Canada");
        assert_eq!(remote_suffix("Toronto, ON", false), "Toronto, ON");
        assert_eq!(remote_suffix("", true), "(remote)");
    }

    #[test]
    fn test_from_fetch_error_flags_rate_limit() {
        let err = FetchError::RetriesExhausted {
            attempts: 4,
            last_error: "HTTP 429".into(),
            rate_limited: true,
        };
        let result = ConnectorResult::from_fetch_error("lever", "acme", &err);
        assert!(!result.success);
        assert!(result.rate_limited);
    }
}
