//! Raw job captures, exactly as a source reported them.

use serde::{Deserialize, Serialize};

/// An untransformed job posting captured from a source.
///
/// Connectors produce these; the normalizer turns them into canonical
/// jobs. The original payload is kept for later replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJob {
    /// Source name (e.g. "greenhouse", "lever", "search_aggregator")
    pub source: String,

    /// Stable platform id, or a synthetic hash when the source has none
    pub source_job_id: String,

    /// Posting title
    pub title: String,

    /// Company name as reported
    pub company: String,

    /// Public posting URL
    pub url: String,

    /// Free-text location, possibly empty
    pub location_raw: String,

    /// Posting body; plaintext preferred, HTML acceptable
    pub content: String,

    /// Source-reported publish timestamp, unparsed
    pub posted_at: Option<String>,

    /// Original serialized document for replay
    pub raw_payload: String,
}

impl RawJob {
    /// Create a raw job with the required identity fields.
    pub fn new(
        source: impl Into<String>,
        source_job_id: impl Into<String>,
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_job_id: source_job_id.into(),
            title: title.into(),
            company: company.into(),
            url: url.into(),
            location_raw: String::new(),
            content: String::new(),
            posted_at: None,
            raw_payload: String::new(),
        }
    }

    /// Set the free-text location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location_raw = location.into();
        self
    }

    /// Set the posting body.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the source-reported timestamp.
    pub fn with_posted_at(mut self, posted_at: impl Into<String>) -> Self {
        self.posted_at = Some(posted_at.into());
        self
    }

    /// Set the original payload.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.raw_payload = payload.into();
        self
    }
}

/// Synthetic id for postings whose platform exposes none: a stable hash
/// over `(source, company, title)`.
pub fn synthetic_job_id(source: &str, company: &str, title: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(company.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    format!("syn-{:x}", digest)[..20].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let job = RawJob::new("lever", "abc", "Engineer", "Acme", "https://jobs.lever.co/acme/abc")
            .with_location("Toronto, ON")
            .with_posted_at("2026-01-02T03:04:05Z");

        assert_eq!(job.source, "lever");
        assert_eq!(job.location_raw, "Toronto, ON");
        assert!(job.posted_at.is_some());
    }

    #[test]
    fn test_synthetic_id_stable() {
        let a = synthetic_job_id("html", "Acme", "Engineer");
        let b = synthetic_job_id("html", "Acme", "Engineer");
        let c = synthetic_job_id("html", "Acme", "Senior Engineer");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("syn-"));
    }
}
