//! Per-source daily metrics.

use serde::{Deserialize, Serialize};

/// Daily aggregate for one source; unique on `(source, date)` and
/// accumulated with additive upserts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMetric {
    pub source: String,

    /// Calendar date in the configured timezone, `YYYY-MM-DD`
    pub date: String,

    pub jobs_found: i64,
    pub jobs_new: i64,
    pub jobs_duplicate: i64,
    pub parse_failures: i64,
    pub rate_limit_hits: i64,

    /// Mean response time across requests that day
    pub response_time_avg_ms: f64,

    /// Successful fetches / total fetches for the day
    pub success_rate: f64,

    /// Number of requests folded into the averages
    pub sample_count: i64,
}

impl SourceMetric {
    pub fn new(source: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            date: date.into(),
            ..Default::default()
        }
    }
}
