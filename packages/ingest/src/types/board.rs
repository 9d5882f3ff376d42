//! Discovered ATS boards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ATS board found by discovery, registered for polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredBoard {
    pub id: i64,

    /// ATS platform key (e.g. "greenhouse", "lever")
    pub platform: String,

    /// Canonical board URL; unique
    pub board_url: String,

    /// Company slug extracted from the URL
    pub board_slug: String,

    /// 0.0–1.0; discovery raises it to at least 0.75 on every sighting
    pub confidence: f64,

    pub status: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,

    /// Last poll that returned at least one job
    pub last_success_at: Option<DateTime<Utc>>,

    /// Consecutive polls that yielded zero jobs
    pub consecutive_zero_runs: i64,
}
