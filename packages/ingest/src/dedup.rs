//! Three-pass duplicate detection.
//!
//! 1. Exact URL-hash lookup.
//! 2. Fuzzy identity over an in-memory index of recent active jobs,
//!    keyed `"company | title | city"` and compared with Jaro-Winkler.
//! 3. Content fingerprint: a match first seen within the repost window is
//!    a duplicate; older matches flag the new job as a repost instead.
//!
//! The fuzzy index is built once per pipeline run and discarded at the
//! end.

use chrono::{DateTime, FixedOffset, Utc};
use strsim::jaro_winkler;

use crate::error::StoreResult;
use crate::normalize::NormalizedJob;
use crate::stores::JobStore;
use crate::types::fuzzy_key;

/// Which pass identified the duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupMethod {
    UrlHash,
    FuzzyKey,
    ContentFingerprint,
}

impl DedupMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupMethod::UrlHash => "url_hash",
            DedupMethod::FuzzyKey => "fuzzy_key",
            DedupMethod::ContentFingerprint => "content_fingerprint",
        }
    }
}

/// Outcome of running the three passes over one normalized job.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    /// No match anywhere
    Unique,

    /// A confident duplicate; the job is not inserted
    Duplicate {
        method: DedupMethod,
        existing_id: i64,
        similarity: f64,
    },

    /// Fuzzy similarity in the gray zone; the job is still inserted but
    /// linked to the suspected original
    PotentialDuplicate { existing_id: i64, similarity: f64 },

    /// Same content as a job first seen before the repost window; insert
    /// as new with a backpointer
    Repost {
        original_id: i64,
        original_post_date: Option<DateTime<FixedOffset>>,
    },
}

/// Similarity thresholds and the repost window.
#[derive(Debug, Clone, Copy)]
pub struct DedupThresholds {
    /// At or above: confident duplicate
    pub duplicate: f64,

    /// At or above (but below `duplicate`): potential duplicate
    pub potential: f64,

    /// Content matches older than this many days are reposts
    pub repost_window_days: i64,
}

impl Default for DedupThresholds {
    fn default() -> Self {
        Self { duplicate: 0.85, potential: 0.70, repost_window_days: 7 }
    }
}

/// In-memory index of recent active jobs for the fuzzy pass.
#[derive(Debug, Default)]
pub struct FuzzyIndex {
    entries: Vec<(String, i64)>,
}

impl FuzzyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(id, company, title, city)` rows.
    pub fn from_rows(rows: Vec<(i64, String, String, Option<String>)>) -> Self {
        let entries = rows
            .into_iter()
            .map(|(id, company, title, city)| {
                (fuzzy_key(&crate::normalize::normalize_company(&company), &title, city.as_deref()), id)
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest-similarity entry for a key, if any.
    pub fn best_match(&self, key: &str) -> Option<(i64, f64)> {
        self.entries
            .iter()
            .map(|(candidate, id)| (*id, jaro_winkler(key, candidate)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// The dedup engine for one pipeline run.
pub struct DedupEngine {
    index: FuzzyIndex,
    thresholds: DedupThresholds,
}

impl DedupEngine {
    pub fn new(index: FuzzyIndex, thresholds: DedupThresholds) -> Self {
        Self { index, thresholds }
    }

    /// Load the fuzzy index from recent active jobs.
    pub async fn load(
        store: &JobStore,
        now: DateTime<Utc>,
        thresholds: DedupThresholds,
    ) -> StoreResult<Self> {
        let rows = store
            .recent_active_for_fuzzy(now, thresholds.repost_window_days)
            .await?;
        tracing::debug!(entries = rows.len(), "loaded fuzzy dedup index");
        Ok(Self::new(FuzzyIndex::from_rows(rows), thresholds))
    }

    /// Run the three passes, short-circuiting on the first positive.
    pub async fn check(
        &self,
        store: &JobStore,
        job: &NormalizedJob,
        now: DateTime<Utc>,
    ) -> StoreResult<DedupOutcome> {
        // Pass 1: exact URL hash
        if let Some(existing) = store.get_by_url_hash(&job.url_hash).await? {
            return Ok(DedupOutcome::Duplicate {
                method: DedupMethod::UrlHash,
                existing_id: existing.id,
                similarity: 1.0,
            });
        }

        // Pass 2: fuzzy identity over the in-memory index
        let key = fuzzy_key(&job.company, &job.title, job.city.as_deref());
        if let Some((existing_id, similarity)) = self.index.best_match(&key) {
            if similarity >= self.thresholds.duplicate {
                return Ok(DedupOutcome::Duplicate {
                    method: DedupMethod::FuzzyKey,
                    existing_id,
                    similarity,
                });
            }
            if similarity >= self.thresholds.potential {
                return Ok(DedupOutcome::PotentialDuplicate { existing_id, similarity });
            }
        }

        // Pass 3: content fingerprint with repost detection. Every job
        // whose body cleaned down to nothing shares one fingerprint, so
        // that value must not equate unrelated postings.
        if !crate::normalize::hash::is_empty_content_fingerprint(&job.content_fingerprint) {
            if let Some(existing) = store.get_active_by_fingerprint(&job.content_fingerprint).await? {
                let age_days = (now - existing.first_seen_at).num_days();
                if age_days <= self.thresholds.repost_window_days {
                    return Ok(DedupOutcome::Duplicate {
                        method: DedupMethod::ContentFingerprint,
                        existing_id: existing.id,
                        similarity: 1.0,
                    });
                }
                return Ok(DedupOutcome::Repost {
                    original_id: existing.id,
                    original_post_date: existing
                        .posted_at
                        .or_else(|| Some(existing.first_seen_at.fixed_offset())),
                });
            }
        }

        Ok(DedupOutcome::Unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{content_fingerprint, url_hash};
    use crate::types::{
        NewCanonicalJob, PostedAtConfidence, ScoreBand, TitleBucket, WorkMode,
    };
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap()
    }

    fn normalized(url: &str, company: &str, title: &str, city: Option<&str>, content: &str) -> NormalizedJob {
        NormalizedJob {
            title: title.into(),
            company: company.into(),
            url: url.into(),
            url_hash: url_hash(url),
            content_fingerprint: content_fingerprint(content),
            title_bucket: TitleBucket::Include,
            city: city.map(String::from),
            province: city.map(|_| "Ontario".to_string()),
            country: city.map(|_| "Canada".to_string()),
            location_tier: None,
            location_points: 0,
            work_mode: WorkMode::Unknown,
            posted_at: None,
            posted_at_confidence: PostedAtConfidence::Low,
        }
    }

    fn insertable(job: &NormalizedJob, posted_at: Option<DateTime<FixedOffset>>) -> NewCanonicalJob {
        NewCanonicalJob {
            raw_job_id: None,
            source: "lever".into(),
            title: job.title.clone(),
            company: job.company.clone(),
            url: job.url.clone(),
            url_hash: job.url_hash.clone(),
            content_fingerprint: job.content_fingerprint.clone(),
            city: job.city.clone(),
            province: job.province.clone(),
            country: job.country.clone(),
            location_tier: None,
            work_mode: WorkMode::Unknown,
            title_bucket: TitleBucket::Include,
            score: 0,
            score_freshness: 0,
            score_location: 0,
            score_mode: 0,
            score_band: ScoreBand::WorthALook,
            posted_at,
            posted_at_confidence: PostedAtConfidence::Low,
            is_backfill: false,
            is_reposted: false,
            original_post_date: None,
        }
    }

    async fn empty_engine(store: &JobStore) -> DedupEngine {
        DedupEngine::load(store, now(), DedupThresholds::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_url_hash_pass() {
        let store = JobStore::in_memory().await.unwrap();
        let original = normalized(
            "https://boards.example.com/jobs/abc/",
            "Acme",
            "Software Engineer",
            Some("Toronto"),
            "body",
        );
        let id = store.insert_canonical(&insertable(&original, None), now()).await.unwrap();

        // Same posting behind different casing and a tracking param
        let incoming = normalized(
            "HTTPS://BOARDS.EXAMPLE.COM/jobs/abc?ref=foo",
            "Acme",
            "Software Engineer",
            Some("Toronto"),
            "different body",
        );
        let engine = empty_engine(&store).await;
        let outcome = engine.check(&store, &incoming, now()).await.unwrap();

        assert_eq!(
            outcome,
            DedupOutcome::Duplicate { method: DedupMethod::UrlHash, existing_id: id, similarity: 1.0 }
        );
    }

    #[tokio::test]
    async fn test_fuzzy_pass_exact_key() {
        let store = JobStore::in_memory().await.unwrap();
        let original = normalized(
            "https://x.com/1",
            "Acme",
            "Software Engineer",
            Some("Toronto"),
            "body one",
        );
        let id = store.insert_canonical(&insertable(&original, None), now()).await.unwrap();

        // Legal-suffix stripping makes "Acme Inc." identical to "Acme"
        let engine = DedupEngine::load(&store, now(), DedupThresholds::default()).await.unwrap();
        let incoming = normalized(
            "https://other.com/99",
            "Acme",
            "Software Engineer",
            Some("Toronto"),
            "body two",
        );
        let outcome = engine.check(&store, &incoming, now()).await.unwrap();

        match outcome {
            DedupOutcome::Duplicate { method, existing_id, similarity } => {
                assert_eq!(method, DedupMethod::FuzzyKey);
                assert_eq!(existing_id, id);
                assert!((similarity - 1.0).abs() < f64::EPSILON);
            }
            other => panic!("expected fuzzy duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fuzzy_pass_potential_zone() {
        let index = FuzzyIndex::from_rows(vec![(
            7,
            "Acme".into(),
            "Software Engineer II".into(),
            Some("Toronto".into()),
        )]);
        let engine = DedupEngine::new(index, DedupThresholds {
            duplicate: 0.99,
            potential: 0.70,
            repost_window_days: 7,
        });
        let store = JobStore::in_memory().await.unwrap();

        let incoming = normalized(
            "https://x.com/2",
            "Acme",
            "Software Engineer",
            Some("Toronto"),
            "body",
        );
        let outcome = engine.check(&store, &incoming, now()).await.unwrap();
        match outcome {
            DedupOutcome::PotentialDuplicate { existing_id, similarity } => {
                assert_eq!(existing_id, 7);
                assert!(similarity >= 0.70 && similarity < 0.99);
            }
            other => panic!("expected potential duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fingerprint_within_window_is_duplicate() {
        let store = JobStore::in_memory().await.unwrap();
        let original = normalized("https://x.com/1", "Acme", "Software Engineer", None, "same content");
        let id = store
            .insert_canonical(&insertable(&original, None), now() - chrono::Duration::days(3))
            .await
            .unwrap();

        let engine = empty_engine(&store).await;
        // Different company/title so the fuzzy pass cannot fire first
        let incoming = normalized("https://y.com/2", "Globex", "Backend Developer", None, "same content");
        let outcome = engine.check(&store, &incoming, now()).await.unwrap();
        assert_eq!(
            outcome,
            DedupOutcome::Duplicate {
                method: DedupMethod::ContentFingerprint,
                existing_id: id,
                similarity: 1.0
            }
        );
    }

    #[tokio::test]
    async fn test_fingerprint_past_window_is_repost() {
        let store = JobStore::in_memory().await.unwrap();
        let posted = (now() - chrono::Duration::days(10)).fixed_offset();
        let original = normalized("https://x.com/1", "Acme", "Software Engineer", None, "same content");
        let id = store
            .insert_canonical(&insertable(&original, Some(posted)), now() - chrono::Duration::days(10))
            .await
            .unwrap();

        let engine = empty_engine(&store).await;
        let incoming = normalized("https://y.com/2", "Globex", "Backend Developer", None, "same content");
        let outcome = engine.check(&store, &incoming, now()).await.unwrap();

        match outcome {
            DedupOutcome::Repost { original_id, original_post_date } => {
                assert_eq!(original_id, id);
                assert_eq!(original_post_date.unwrap().timestamp(), posted.timestamp());
            }
            other => panic!("expected repost, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_bodies_never_match_each_other() {
        // Two unrelated postings whose sources exposed no body share the
        // empty fingerprint; that must not read as duplicate or repost
        let store = JobStore::in_memory().await.unwrap();
        let first = normalized("https://a.com/1", "Acme", "Software Engineer", Some("Toronto"), "");
        store
            .insert_canonical(&insertable(&first, None), now() - chrono::Duration::days(10))
            .await
            .unwrap();

        let engine = empty_engine(&store).await;
        let second = normalized("https://b.com/2", "Globex", "Backend Developer", Some("Ottawa"), "");
        let outcome = engine.check(&store, &second, now()).await.unwrap();
        assert_eq!(outcome, DedupOutcome::Unique);
    }

    #[tokio::test]
    async fn test_empty_index_and_store_is_unique() {
        let store = JobStore::in_memory().await.unwrap();
        let engine = empty_engine(&store).await;
        assert!(engine.index.is_empty());

        let incoming = normalized("https://x.com/1", "Acme", "Engineer", None, "body");
        let outcome = engine.check(&store, &incoming, now()).await.unwrap();
        assert_eq!(outcome, DedupOutcome::Unique);
    }

    #[tokio::test]
    async fn test_index_is_static_within_a_run() {
        // The index is built once per run; jobs inserted mid-run are only
        // caught by the URL-hash and fingerprint passes
        let store = JobStore::in_memory().await.unwrap();
        let engine = empty_engine(&store).await;

        let first = normalized("https://x.com/1", "Acme", "Software Engineer", Some("Toronto"), "a");
        store.insert_canonical(&insertable(&first, None), now()).await.unwrap();

        let second = normalized("https://y.com/2", "Acme", "Software Engineer", Some("Toronto"), "b");
        let outcome = engine.check(&store, &second, now()).await.unwrap();
        assert_eq!(outcome, DedupOutcome::Unique);
    }
}
