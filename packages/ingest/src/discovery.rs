//! ATS board discovery via the web-search API.
//!
//! Each configured discovery query returns a page of results; every
//! result's link, title, and snippet are run through an ordered list of
//! ATS URL patterns. Matches are upserted into the board registry, which
//! keeps the max confidence seen and refreshes `last_seen_at`. The whole
//! job is idempotent.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::search_api::SearchApiClient;
use crate::stores::JobStore;

/// Confidence floor applied on every sighting.
const DISCOVERY_CONFIDENCE: f64 = 0.75;

/// One ATS platform's URL pattern and canonical board URL shape.
struct BoardPattern {
    platform: &'static str,
    pattern: Regex,
    board_url_template: &'static str,
}

fn board_patterns() -> Vec<BoardPattern> {
    // Order matters: earlier patterns win when a result matches several
    vec![
        BoardPattern {
            platform: "greenhouse",
            pattern: Regex::new(r"boards\.greenhouse\.io/([A-Za-z0-9_-]+)").unwrap(),
            board_url_template: "https://boards.greenhouse.io/{slug}",
        },
        BoardPattern {
            platform: "lever",
            pattern: Regex::new(r"jobs\.lever\.co/([A-Za-z0-9_-]+)").unwrap(),
            board_url_template: "https://jobs.lever.co/{slug}",
        },
        BoardPattern {
            platform: "ashby",
            pattern: Regex::new(r"jobs\.ashbyhq\.com/([A-Za-z0-9_-]+)").unwrap(),
            board_url_template: "https://jobs.ashbyhq.com/{slug}",
        },
        BoardPattern {
            platform: "workable",
            pattern: Regex::new(r"apply\.workable\.com/([A-Za-z0-9_-]+)").unwrap(),
            board_url_template: "https://apply.workable.com/{slug}",
        },
        BoardPattern {
            platform: "recruitee",
            pattern: Regex::new(r"([A-Za-z0-9-]+)\.recruitee\.com").unwrap(),
            board_url_template: "https://{slug}.recruitee.com",
        },
    ]
}

/// Slugs that appear in ATS URLs but are not company boards.
const NON_BOARD_SLUGS: &[&str] = &["embed", "api", "www", "app", "help", "support", "login"];

/// Summary of one discovery sweep.
#[derive(Debug, Default, Clone)]
pub struct DiscoveryStats {
    pub queries_run: usize,
    pub results_seen: usize,
    pub boards_upserted: usize,
}

/// Board discovery job.
pub struct BoardDiscovery {
    patterns: Vec<BoardPattern>,
    query_delay: Duration,
}

impl Default for BoardDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardDiscovery {
    pub fn new() -> Self {
        Self {
            patterns: board_patterns(),
            query_delay: Duration::from_millis(1_500),
        }
    }

    /// Set the polite delay between queries.
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    /// Run every discovery query and upsert matching boards.
    pub async fn run(
        &self,
        search: &SearchApiClient,
        store: &JobStore,
        queries: &[String],
        now: DateTime<Utc>,
    ) -> Result<DiscoveryStats> {
        let mut stats = DiscoveryStats::default();

        if !search.is_enabled() {
            info!("search API disabled, skipping board discovery");
            return Ok(stats);
        }

        for (i, query) in queries.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.query_delay).await;
            }

            let items = match search.search(query, 20).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(query, error = %e, "discovery query failed");
                    continue;
                }
            };
            stats.queries_run += 1;
            stats.results_seen += items.len();

            for item in items {
                let haystack = format!("{} {} {}", item.link, item.title, item.snippet);
                let Some((platform, slug, board_url)) = self.match_board(&haystack) else {
                    continue;
                };

                store
                    .upsert_discovered_board(platform, &board_url, &slug, DISCOVERY_CONFIDENCE, now)
                    .await?;
                stats.boards_upserted += 1;
                debug!(platform, slug, "board discovered");
            }
        }

        info!(
            queries = stats.queries_run,
            results = stats.results_seen,
            boards = stats.boards_upserted,
            "discovery sweep finished"
        );
        Ok(stats)
    }

    /// Run the ordered patterns; first match wins.
    fn match_board(&self, text: &str) -> Option<(&'static str, String, String)> {
        for entry in &self.patterns {
            if let Some(captures) = entry.pattern.captures(text) {
                let slug = captures.get(1)?.as_str().to_lowercase();
                if NON_BOARD_SLUGS.contains(&slug.as_str()) {
                    continue;
                }
                let board_url = entry.board_url_template.replace("{slug}", &slug);
                return Some((entry.platform, slug, board_url));
            }
        }
        None
    }
}
