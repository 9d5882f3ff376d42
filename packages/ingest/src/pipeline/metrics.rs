//! Per-source metric accumulation within one run.

use std::collections::BTreeMap;

use crate::connectors::ConnectorResult;
use crate::types::SourceMetric;

#[derive(Debug, Default)]
struct SourceAccumulator {
    jobs_found: i64,
    jobs_new: i64,
    jobs_duplicate: i64,
    parse_failures: i64,
    rate_limit_hits: i64,
    response_times_ms: Vec<u64>,
    attempts: i64,
    successes: i64,
}

/// Accumulates per-source tallies during a run; committed as one additive
/// upsert per `(source, date)` at run end.
#[derive(Debug)]
pub struct MetricsAccumulator {
    date: String,
    sources: BTreeMap<String, SourceAccumulator>,
}

impl MetricsAccumulator {
    /// `date` is the run's calendar date in the configured timezone.
    pub fn new(date: impl Into<String>) -> Self {
        Self { date: date.into(), sources: BTreeMap::new() }
    }

    fn entry(&mut self, source: &str) -> &mut SourceAccumulator {
        self.sources.entry(source.to_string()).or_default()
    }

    /// Fold in one connector result.
    pub fn record_result(&mut self, result: &ConnectorResult) {
        let entry = self.entry(&result.source);
        entry.attempts += 1;
        entry.jobs_found += result.jobs.len() as i64;
        if result.success {
            entry.successes += 1;
            entry.response_times_ms.push(result.response_time_ms);
        } else {
            entry.parse_failures += 1;
        }
        if result.rate_limited {
            entry.rate_limit_hits += 1;
        }
    }

    pub fn record_new(&mut self, source: &str) {
        self.entry(source).jobs_new += 1;
    }

    pub fn record_duplicate(&mut self, source: &str) {
        self.entry(source).jobs_duplicate += 1;
    }

    pub fn record_parse_failure(&mut self, source: &str) {
        self.entry(source).parse_failures += 1;
    }

    /// Total parse failures across sources (for the run log).
    pub fn total_parse_failures(&self) -> i64 {
        self.sources.values().map(|s| s.parse_failures).sum()
    }

    /// Finalize into one metric row per source.
    pub fn into_metrics(self) -> Vec<SourceMetric> {
        let date = self.date;
        self.sources
            .into_iter()
            .map(|(source, acc)| {
                let sample_count = acc.response_times_ms.len() as i64;
                let response_time_avg_ms = if sample_count > 0 {
                    acc.response_times_ms.iter().sum::<u64>() as f64 / sample_count as f64
                } else {
                    0.0
                };
                let success_rate = if acc.attempts > 0 {
                    acc.successes as f64 / acc.attempts as f64
                } else {
                    0.0
                };
                SourceMetric {
                    source,
                    date: date.clone(),
                    jobs_found: acc.jobs_found,
                    jobs_new: acc.jobs_new,
                    jobs_duplicate: acc.jobs_duplicate,
                    parse_failures: acc.parse_failures,
                    rate_limit_hits: acc.rate_limit_hits,
                    response_time_avg_ms,
                    success_rate,
                    // Weight the additive upsert by attempts, not just
                    // successful samples
                    sample_count: acc.attempts.max(sample_count),
                }
            })
            .collect()
    }
}
