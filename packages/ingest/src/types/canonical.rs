//! Canonical jobs: normalized, scored, deduplicated postings.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Where a title landed after filter matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleBucket {
    Include,
    Maybe,
    Reject,
}

impl TitleBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleBucket::Include => "include",
            TitleBucket::Maybe => "maybe",
            TitleBucket::Reject => "reject",
        }
    }

    /// Total mapping from stored strings; unknown values reject.
    pub fn parse(s: &str) -> Self {
        match s {
            "include" => TitleBucket::Include,
            "maybe" => TitleBucket::Maybe,
            _ => TitleBucket::Reject,
        }
    }
}

/// On-site / hybrid / remote classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Onsite,
    Hybrid,
    Remote,
    Unknown,
}

impl WorkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkMode::Onsite => "onsite",
            WorkMode::Hybrid => "hybrid",
            WorkMode::Remote => "remote",
            WorkMode::Unknown => "unknown",
        }
    }

    /// Total mapping from stored strings; unknown values map to Unknown.
    pub fn parse(s: &str) -> Self {
        match s {
            "onsite" => WorkMode::Onsite,
            "hybrid" => WorkMode::Hybrid,
            "remote" => WorkMode::Remote,
            _ => WorkMode::Unknown,
        }
    }
}

/// Score band controlling downstream treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreBand {
    TopPriority,
    GoodMatch,
    WorthALook,
}

impl ScoreBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreBand::TopPriority => "topPriority",
            ScoreBand::GoodMatch => "goodMatch",
            ScoreBand::WorthALook => "worthALook",
        }
    }

    /// Total mapping from stored strings; unknown values land in the
    /// lowest band.
    pub fn parse(s: &str) -> Self {
        match s {
            "topPriority" => ScoreBand::TopPriority,
            "goodMatch" => ScoreBand::GoodMatch,
            _ => ScoreBand::WorthALook,
        }
    }
}

/// Lifecycle state of a canonical job.
///
/// Transitions are monotone: `active` may move to any of the others and
/// nothing moves back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Applied,
    Dismissed,
    Expired,
    Archived,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Applied => "applied",
            JobStatus::Dismissed => "dismissed",
            JobStatus::Expired => "expired",
            JobStatus::Archived => "archived",
        }
    }

    /// Total mapping from stored strings; unknown values read as archived
    /// so they never re-enter the active set.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => JobStatus::Active,
            "applied" => JobStatus::Applied,
            "dismissed" => JobStatus::Dismissed,
            "expired" => JobStatus::Expired,
            _ => JobStatus::Archived,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(self, JobStatus::Active) && next != JobStatus::Active
    }
}

/// Confidence in the parsed posting timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostedAtConfidence {
    High,
    Medium,
    Low,
}

impl PostedAtConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostedAtConfidence::High => "high",
            PostedAtConfidence::Medium => "medium",
            PostedAtConfidence::Low => "low",
        }
    }

    /// Total mapping from stored strings; unknown values read as low.
    pub fn parse(s: &str) -> Self {
        match s {
            "high" => PostedAtConfidence::High,
            "medium" => PostedAtConfidence::Medium,
            _ => PostedAtConfidence::Low,
        }
    }
}

/// Score breakdown for a canonical job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub total: i64,
    pub freshness: i64,
    pub location: i64,
    pub mode: i64,
    pub band: ScoreBand,
}

/// A canonical job as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalJob {
    pub id: i64,
    pub raw_job_id: Option<i64>,
    pub source: String,
    pub title: String,
    pub company: String,
    pub url: String,

    /// SHA-256 of the cleaned URL; unique across all canonical jobs
    pub url_hash: String,

    /// SHA-256 of the cleaned posting body
    pub content_fingerprint: String,

    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,

    /// Location tier key (L1..L5) when a tier matched
    pub location_tier: Option<String>,

    pub work_mode: WorkMode,
    pub title_bucket: TitleBucket,

    pub score: i64,
    pub score_freshness: i64,
    pub score_location: i64,
    pub score_mode: i64,
    pub score_band: ScoreBand,

    /// Posting timestamp in the configured wall-clock timezone
    pub posted_at: Option<DateTime<FixedOffset>>,
    pub posted_at_confidence: PostedAtConfidence,
    pub first_seen_at: DateTime<Utc>,

    pub status: JobStatus,
    pub is_backfill: bool,
    pub is_reposted: bool,
    pub original_post_date: Option<DateTime<FixedOffset>>,
}

impl CanonicalJob {
    /// Lowercased `"company | title | city"` key used by the fuzzy dedup
    /// index.
    pub fn fuzzy_key(&self) -> String {
        fuzzy_key(&self.company, &self.title, self.city.as_deref())
    }
}

/// Build the fuzzy dedup key for any `(company, title, city)` triple.
pub fn fuzzy_key(company: &str, title: &str, city: Option<&str>) -> String {
    format!(
        "{} | {} | {}",
        company.trim().to_lowercase(),
        title.trim().to_lowercase(),
        city.unwrap_or("").trim().to_lowercase()
    )
}

/// A canonical job ready for insertion (no id yet).
#[derive(Debug, Clone)]
pub struct NewCanonicalJob {
    pub raw_job_id: Option<i64>,
    pub source: String,
    pub title: String,
    pub company: String,
    pub url: String,
    pub url_hash: String,
    pub content_fingerprint: String,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub location_tier: Option<String>,
    pub work_mode: WorkMode,
    pub title_bucket: TitleBucket,
    pub score: i64,
    pub score_freshness: i64,
    pub score_location: i64,
    pub score_mode: i64,
    pub score_band: ScoreBand,
    pub posted_at: Option<DateTime<FixedOffset>>,
    pub posted_at_confidence: PostedAtConfidence,
    pub is_backfill: bool,
    pub is_reposted: bool,
    pub original_post_date: Option<DateTime<FixedOffset>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trips() {
        for mode in [WorkMode::Onsite, WorkMode::Hybrid, WorkMode::Remote, WorkMode::Unknown] {
            assert_eq!(WorkMode::parse(mode.as_str()), mode);
        }
        for band in [ScoreBand::TopPriority, ScoreBand::GoodMatch, ScoreBand::WorthALook] {
            assert_eq!(ScoreBand::parse(band.as_str()), band);
        }
        for status in [
            JobStatus::Active,
            JobStatus::Applied,
            JobStatus::Dismissed,
            JobStatus::Expired,
            JobStatus::Archived,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_unknown_strings_have_safe_fallbacks() {
        assert_eq!(WorkMode::parse("teleport"), WorkMode::Unknown);
        assert_eq!(TitleBucket::parse("other"), TitleBucket::Reject);
        assert_eq!(PostedAtConfidence::parse(""), PostedAtConfidence::Low);
        assert_eq!(JobStatus::parse("gone"), JobStatus::Archived);
    }

    #[test]
    fn test_status_transitions_monotone() {
        assert!(JobStatus::Active.can_transition_to(JobStatus::Applied));
        assert!(JobStatus::Active.can_transition_to(JobStatus::Expired));
        assert!(!JobStatus::Applied.can_transition_to(JobStatus::Active));
        assert!(!JobStatus::Dismissed.can_transition_to(JobStatus::Applied));
        assert!(!JobStatus::Active.can_transition_to(JobStatus::Active));
    }

    #[test]
    fn test_fuzzy_key() {
        assert_eq!(
            fuzzy_key(" Acme ", "Software Engineer", Some("Toronto")),
            "acme | software engineer | toronto"
        );
        assert_eq!(fuzzy_key("Acme", "Dev", None), "acme | dev | ");
    }
}
