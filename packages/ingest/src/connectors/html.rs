//! Selector-driven HTML career-page connector.
//!
//! Parses a career page with a small per-platform selector map. When the
//! primary selectors find nothing on a page that returned 200, a broader
//! heuristic pass scans every anchor whose path looks job-shaped,
//! filtering out navigation anchors. Only a page where both passes come
//! up empty counts as a parse failure.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::{SelectorMap, SourceDef};
use crate::fetch::{FetchOptions, Fetcher};
use crate::types::RawJob;

use super::{fill_template, Connector, ConnectorResult};

/// Path fragments that mark an anchor as probably-a-job in the fallback
/// pass.
const JOB_PATH_HINTS: &[&str] =
    &["/job", "/jobs", "/careers/", "/career/", "/position", "/opening", "/vacanc"];

/// Anchor texts that are navigation chrome, not postings.
const NON_JOB_TEXT: &[&str] = &[
    "apply",
    "apply now",
    "learn more",
    "view all",
    "see more",
    "read more",
    "view this job",
    "sign in",
    "log in",
    "get started",
];

#[derive(Debug, Clone)]
struct ParsedJob {
    url: String,
    title: String,
    location: String,
    content: String,
}

/// Connector for selector-driven HTML career pages.
pub struct HtmlConnector {
    source: String,
}

impl HtmlConnector {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }
}

#[async_trait]
impl Connector for HtmlConnector {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self, fetcher: &Fetcher, company: &str, def: &SourceDef) -> ConnectorResult {
        let template = match def.require_url_template(&self.source) {
            Ok(t) => t,
            Err(e) => return ConnectorResult::failed(&self.source, company, e.to_string(), false),
        };
        let page_url = fill_template(template, company);
        let options = FetchOptions::default()
            .with_timeout_ms(def.timeout_ms)
            .with_max_retries(def.max_retries);

        let outcome = match fetcher.fetch(&page_url, &options).await {
            Ok(outcome) => outcome,
            Err(e) => return ConnectorResult::from_fetch_error(&self.source, company, &e),
        };

        let base = match Url::parse(&page_url) {
            Ok(base) => base,
            Err(_) => {
                return ConnectorResult::failed(
                    &self.source,
                    company,
                    format!("invalid page URL: {page_url}"),
                    outcome.rate_limited,
                )
            }
        };

        let selectors = def.selectors.clone().unwrap_or_default();
        let parsed = parse_jobs(&outcome.body, &base, &selectors);

        if parsed.is_empty() {
            // A 200 page that yields nothing from either pass is a parse
            // failure for this company
            return ConnectorResult::failed(
                &self.source,
                company,
                "no jobs parsed from page",
                outcome.rate_limited,
            );
        }

        let jobs = parsed
            .into_iter()
            .map(|job| {
                RawJob::new(&self.source, job.url.clone(), job.title, company, job.url)
                    .with_location(job.location)
                    .with_content(job.content)
            })
            .collect::<Vec<_>>();

        debug!(source = %self.source, company, jobs = jobs.len(), "page parsed");
        let mut result =
            ConnectorResult::ok(&self.source, company, jobs, outcome.response_time_ms);
        result.rate_limited = outcome.rate_limited;
        result
    }
}

/// Parse a page: primary selector pass, then the heuristic fallback.
/// Synchronous on purpose: the parsed document must not live across an
/// await point.
fn parse_jobs(html: &str, base: &Url, selectors: &SelectorMap) -> Vec<ParsedJob> {
    let document = Html::parse_document(html);

    let mut jobs = primary_pass(&document, base, selectors);
    if jobs.is_empty() {
        jobs = heuristic_pass(&document, base);
    }

    // De-duplicate within the page by resolved URL
    let mut seen = std::collections::HashSet::new();
    jobs.retain(|job| seen.insert(job.url.clone()));
    jobs
}

fn primary_pass(document: &Html, base: &Url, selectors: &SelectorMap) -> Vec<ParsedJob> {
    if selectors.job.is_empty() {
        return Vec::new();
    }
    let Ok(job_selector) = Selector::parse(&selectors.job) else {
        return Vec::new();
    };
    let title_selector = Selector::parse(&selectors.title).ok().filter(|_| !selectors.title.is_empty());
    let location_selector =
        Selector::parse(&selectors.location).ok().filter(|_| !selectors.location.is_empty());
    let description_selector =
        Selector::parse(&selectors.description).ok().filter(|_| !selectors.description.is_empty());

    document
        .select(&job_selector)
        .filter_map(|element| {
            let anchor = find_anchor(element)?;
            let href = anchor.value().attr("href")?;
            let url = base.join(href).ok()?;

            let title = match &title_selector {
                Some(sel) => element
                    .select(sel)
                    .next()
                    .map(element_text)
                    .unwrap_or_else(|| element_text(anchor)),
                None => element_text(anchor),
            };
            let location = location_selector
                .as_ref()
                .and_then(|sel| element.select(sel).next())
                .map(element_text)
                .unwrap_or_default();

            // The card's own text stands in for a body when no selector
            // is configured, but only when it says more than the anchor
            // does; a bare title carries no content identity
            let content = description_selector
                .as_ref()
                .and_then(|sel| element.select(sel).next())
                .map(element_text)
                .unwrap_or_else(|| {
                    let card_text = element_text(element);
                    if card_text == element_text(anchor) {
                        String::new()
                    } else {
                        card_text
                    }
                });

            let title = title.trim().to_string();
            if title.is_empty() {
                return None;
            }
            Some(ParsedJob { url: url.to_string(), title, location, content })
        })
        .collect()
}

fn heuristic_pass(document: &Html, base: &Url) -> Vec<ParsedJob> {
    let anchor_selector = Selector::parse("a[href]").expect("static selector");

    document
        .select(&anchor_selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
                return None;
            }
            let url = base.join(href).ok()?;
            let path = url.path().to_lowercase();
            if !JOB_PATH_HINTS.iter().any(|hint| path.contains(hint)) {
                return None;
            }

            let title = element_text(anchor).trim().to_string();
            let title_lower = title.to_lowercase();
            if title.len() < 5 || NON_JOB_TEXT.iter().any(|nav| title_lower == *nav) {
                return None;
            }

            // An anchor has no body; dedup treats empty fingerprints as
            // carrying no identity
            Some(ParsedJob {
                url: url.to_string(),
                title,
                location: String::new(),
                content: String::new(),
            })
        })
        .collect()
}

fn find_anchor(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if element.value().name() == "a" {
        return Some(element);
    }
    let anchor_selector = Selector::parse("a[href]").expect("static selector");
    element.select(&anchor_selector).next()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://acme.example.com/careers").unwrap()
    }

    fn selectors() -> SelectorMap {
        SelectorMap {
            job: "li.posting".into(),
            title: "h3".into(),
            location: ".location".into(),
            description: ".summary".into(),
        }
    }

    #[test]
    fn test_primary_pass_with_selector_map() {
        let html = r#"
            <ul>
              <li class="posting">
                <a href="/jobs/123"><h3>Backend Engineer</h3></a>
                <span class="location">Toronto, ON</span>
                <p class="summary">Own the billing APIs. Hybrid schedule.</p>
              </li>
              <li class="posting">
                <a href="https://acme.example.com/jobs/456"><h3>SRE</h3></a>
                <span class="location">Remote</span>
              </li>
            </ul>
        "#;
        let jobs = parse_jobs(html, &base(), &selectors());

        assert_eq!(jobs.len(), 2);
        // Relative href resolved against the page origin
        assert_eq!(jobs[0].url, "https://acme.example.com/jobs/123");
        assert_eq!(jobs[0].title, "Backend Engineer");
        assert_eq!(jobs[0].location, "Toronto, ON");
        assert_eq!(jobs[0].content, "Own the billing APIs. Hybrid schedule.");
        // No description selector hit: the card's own text stands in
        assert!(jobs[1].content.contains("SRE"));
        assert!(jobs[1].content.contains("Remote"));
    }

    #[test]
    fn test_page_dedup_by_resolved_url() {
        let html = r#"
            <li class="posting"><a href="/jobs/123"><h3>Backend Engineer</h3></a></li>
            <li class="posting"><a href="https://acme.example.com/jobs/123"><h3>Backend Engineer</h3></a></li>
        "#;
        let jobs = parse_jobs(html, &base(), &selectors());
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn test_heuristic_fallback_when_selectors_miss() {
        let html = r#"
            <div class="unexpected-markup">
              <a href="/jobs/789">Data Platform Engineer</a>
              <a href="/jobs/search">Apply</a>
              <a href="/about">About us</a>
              <a href="/jobs/790">view all</a>
            </div>
        "#;
        let jobs = parse_jobs(html, &base(), &selectors());

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Data Platform Engineer");
        assert_eq!(jobs[0].url, "https://acme.example.com/jobs/789");
        assert_eq!(jobs[0].content, "");
    }

    #[test]
    fn test_both_passes_empty() {
        let html = "<html><body><a href='/about'>About</a></body></html>";
        let jobs = parse_jobs(html, &base(), &selectors());
        assert!(jobs.is_empty());
    }
}
