//! Search-based connectors (aggregator and underground boards).
//!
//! Runs the configured query list through the shared search client and
//! builds raw jobs from the result items. Results are filtered three
//! ways: blocked role terms in the title, URL shape per known aggregator
//! host, and obvious index pages.

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::SourceDef;
use crate::normalize::timestamp::parse_relative_phrase;
use crate::search_api::{SearchApiClient, SearchItem};
use crate::types::{raw::synthetic_job_id, RawJob};

use super::ConnectorResult;

/// Connector over the web-search API. Unlike board connectors it takes a
/// query list, so it is driven directly by the pipeline rather than the
/// per-company batch fetcher.
pub struct SearchConnector {
    source: String,
}

impl SearchConnector {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Run every configured query and collect the surviving results.
    pub async fn run(
        &self,
        search: &SearchApiClient,
        def: &SourceDef,
        now: DateTime<Utc>,
    ) -> ConnectorResult {
        if !search.is_enabled() {
            return ConnectorResult::failed(&self.source, "search", "no search API keys", false);
        }

        let started = std::time::Instant::now();
        let mut jobs = Vec::new();
        let mut seen_links = std::collections::HashSet::new();
        let mut any_success = false;
        let mut last_error = None;

        for query in &def.queries {
            match search.search(query, 20).await {
                Ok(items) => {
                    any_success = true;
                    for item in items {
                        if !seen_links.insert(item.link.clone()) {
                            continue;
                        }
                        if let Some(job) = self.to_raw_job(&item, def, now) {
                            jobs.push(job);
                        }
                    }
                }
                Err(e) => {
                    warn!(source = %self.source, query, error = %e, "search query failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        debug!(source = %self.source, jobs = jobs.len(), "search sweep finished");
        if any_success {
            let mut result = ConnectorResult::ok(
                &self.source,
                "search",
                jobs,
                started.elapsed().as_millis() as u64,
            );
            result.error = last_error;
            result
        } else {
            ConnectorResult::failed(
                &self.source,
                "search",
                last_error.unwrap_or_else(|| "all queries failed".to_string()),
                false,
            )
        }
    }

    fn to_raw_job(&self, item: &SearchItem, def: &SourceDef, now: DateTime<Utc>) -> Option<RawJob> {
        if item.link.is_empty() || item.title.is_empty() {
            return None;
        }
        if !passes_url_shape(&item.link, def) {
            return None;
        }

        let title_lower = item.title.to_lowercase();
        if def.blocked_terms.iter().any(|term| title_lower.contains(&term.to_lowercase())) {
            return None;
        }

        let (title, company) = split_title_company(&item.title);
        let posted_at = snippet_date(&item.snippet, now);

        let mut raw = RawJob::new(
            &self.source,
            synthetic_job_id(&self.source, &company, &title),
            title,
            company,
            item.link.clone(),
        )
        .with_content(item.snippet.clone())
        .with_payload(
            serde_json::json!({
                "title": item.title,
                "link": item.link,
                "snippet": item.snippet,
            })
            .to_string(),
        );
        if let Some(posted_at) = posted_at {
            raw = raw.with_posted_at(posted_at);
        }
        Some(raw)
    }
}

/// Apply the per-host allow/deny URL substrings. Hosts with no
/// configured shape pass through.
fn passes_url_shape(link: &str, def: &SourceDef) -> bool {
    let Ok(url) = url::Url::parse(link) else {
        return false;
    };
    let host = url.host_str().unwrap_or_default();
    let path = url.path();

    for shape in &def.url_shapes {
        if !host.contains(&shape.host) {
            continue;
        }
        if shape.deny.iter().any(|needle| path.contains(needle.as_str())) {
            return false;
        }
        if !shape.allow.is_empty() {
            let allowed = shape.allow.iter().any(|needle| match_shape(path, needle));
            return allowed;
        }
        return true;
    }
    true
}

/// Match one allow pattern; `<digits>` in the pattern matches a run of
/// ASCII digits.
fn match_shape(path: &str, pattern: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("<digits>") {
        if let Some(rest) = path.split(prefix).nth(1) {
            return rest.chars().take_while(|c| c.is_ascii_digit()).count() > 0;
        }
        return false;
    }
    path.contains(pattern)
}

/// Split a search result title into `(job title, company)`.
///
/// Recognizes `"<title> at <company>"` and `"<company> - <title>"` (with
/// en/em dashes and pipes as separators); otherwise the company is
/// `"Unknown Company"`.
pub fn split_title_company(title: &str) -> (String, String) {
    if let Some(pos) = title.rfind(" at ") {
        let (job, company) = title.split_at(pos);
        let company = company.trim_start_matches(" at ").trim();
        if !company.is_empty() {
            return (job.trim().to_string(), trim_company_tail(company));
        }
    }

    for separator in [" - ", " – ", " — ", " | "] {
        if let Some(pos) = title.find(separator) {
            let company = title[..pos].trim();
            let job = title[pos + separator.len()..].trim();
            if !company.is_empty() && !job.is_empty() {
                return (job.to_string(), company.to_string());
            }
        }
    }

    (title.trim().to_string(), "Unknown Company".to_string())
}

/// Drop trailing site chrome after the company name ("Acme | LinkedIn").
fn trim_company_tail(company: &str) -> String {
    for separator in [" - ", " – ", " — ", " | "] {
        if let Some(pos) = company.find(separator) {
            return company[..pos].trim().to_string();
        }
    }
    company.to_string()
}

/// Find a posting date in snippet text and return it as an ISO date
/// (`YYYY-MM-DD`); None when nothing parses.
pub fn snippet_date(snippet: &str, now: DateTime<Utc>) -> Option<String> {
    let lower = snippet.to_lowercase();

    if lower.contains("today") || lower.contains("just now") {
        return Some(now.format("%Y-%m-%d").to_string());
    }
    if lower.contains("yesterday") {
        return Some((now - chrono::Duration::days(1)).format("%Y-%m-%d").to_string());
    }

    let relative = Regex::new(r"(\d+)\+?\s*(hour|day|week|month)s?\s+ago").unwrap();
    if let Some(m) = relative.find(&lower) {
        if let Some(instant) = parse_relative_phrase(m.as_str(), now) {
            return Some(instant.format("%Y-%m-%d").to_string());
        }
    }

    // Short English dates: "Jul 3, 2026" or "Jul 3"
    let short = Regex::new(r"([A-Z][a-z]{2,8}) (\d{1,2})(?:, (\d{4}))?").unwrap();
    if let Some(captures) = short.captures(snippet) {
        let text = match captures.get(3) {
            Some(year) => format!("{} {}, {}", &captures[1], &captures[2], year.as_str()),
            None => format!("{} {}", &captures[1], &captures[2]),
        };
        let parsed = crate::normalize::timestamp::parse_posted_at(
            Some(&text),
            chrono_tz::UTC,
            now,
        );
        if let Some(at) = parsed.at {
            return Some(at.format("%Y-%m-%d").to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceType, UrlShape};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap()
    }

    fn def(shapes: Vec<UrlShape>, blocked: Vec<&str>) -> SourceDef {
        SourceDef {
            source_type: SourceType::Search,
            enabled: true,
            schedule: None,
            endpoint_template: None,
            url_template: None,
            rate_limiting: Default::default(),
            timeout_ms: 1000,
            max_retries: 0,
            queries: vec!["software engineer toronto".into()],
            selectors: None,
            url_shapes: shapes,
            blocked_terms: blocked.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn test_split_title_company_at_pattern() {
        let (title, company) = split_title_company("Senior Software Engineer at Acme");
        assert_eq!(title, "Senior Software Engineer");
        assert_eq!(company, "Acme");
    }

    #[test]
    fn test_split_title_company_dash_pattern() {
        let (title, company) = split_title_company("Acme - Senior Software Engineer");
        assert_eq!(title, "Senior Software Engineer");
        assert_eq!(company, "Acme");

        let (title, company) = split_title_company("Acme – Backend Developer");
        assert_eq!(title, "Backend Developer");
        assert_eq!(company, "Acme");
    }

    #[test]
    fn test_split_title_company_fallback() {
        let (title, company) = split_title_company("Backend Developer");
        assert_eq!(title, "Backend Developer");
        assert_eq!(company, "Unknown Company");
    }

    #[test]
    fn test_company_tail_trimmed() {
        let (_, company) = split_title_company("Engineer at Acme | LinkedIn");
        assert_eq!(company, "Acme");
    }

    #[test]
    fn test_url_shape_allow_digits() {
        let shapes = vec![UrlShape {
            host: "boards.example.com".into(),
            allow: vec!["/jobs/<digits>".into()],
            deny: vec!["/jobs/search".into()],
        }];
        let def = def(shapes, vec![]);

        assert!(passes_url_shape("https://boards.example.com/jobs/12345", &def));
        assert!(!passes_url_shape("https://boards.example.com/jobs/search?q=x", &def));
        assert!(!passes_url_shape("https://boards.example.com/jobs/browse", &def));
        // Unknown hosts pass through
        assert!(passes_url_shape("https://other.example.com/anything", &def));
    }

    #[test]
    fn test_blocked_terms_filter() {
        let connector = SearchConnector::new("search_aggregator");
        let def = def(vec![], vec!["recruiter", "sales"]);

        let blocked = SearchItem {
            title: "Technical Recruiter at Acme".into(),
            link: "https://boards.example.com/jobs/1".into(),
            snippet: String::new(),
        };
        assert!(connector.to_raw_job(&blocked, &def, now()).is_none());

        let kept = SearchItem {
            title: "Software Engineer at Acme".into(),
            link: "https://boards.example.com/jobs/2".into(),
            snippet: String::new(),
        };
        assert!(connector.to_raw_job(&kept, &def, now()).is_some());
    }

    #[test]
    fn test_snippet_dates() {
        assert_eq!(snippet_date("Posted today · Full-time", now()), Some("2026-07-15".into()));
        assert_eq!(snippet_date("yesterday — apply soon", now()), Some("2026-07-14".into()));
        assert_eq!(snippet_date("3 days ago - Acme is hiring", now()), Some("2026-07-12".into()));
        assert_eq!(snippet_date("2 weeks ago", now()), Some("2026-07-01".into()));
        assert_eq!(snippet_date("Posted Jul 3, 2026 in Toronto", now()), Some("2026-07-03".into()));
        assert_eq!(snippet_date("no date here", now()), None);
    }

    #[test]
    fn test_raw_job_carries_iso_date() {
        let connector = SearchConnector::new("search_aggregator");
        let def = def(vec![], vec![]);
        let item = SearchItem {
            title: "Software Engineer at Acme".into(),
            link: "https://boards.example.com/jobs/42".into(),
            snippet: "2 days ago - build backend systems".into(),
        };
        let raw = connector.to_raw_job(&item, &def, now()).unwrap();
        assert_eq!(raw.posted_at.as_deref(), Some("2026-07-13"));
        assert_eq!(raw.company, "Acme");
    }
}
