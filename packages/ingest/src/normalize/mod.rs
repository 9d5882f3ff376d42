//! Raw → canonical normalization.
//!
//! Pure with respect to `(rules, clock)`: the same raw job always
//! normalizes to the same hashes, buckets, and scores inputs.

pub mod company;
pub mod hash;
pub mod location;
pub mod mode;
pub mod timestamp;
pub mod title;

pub use company::normalize_company;
pub use hash::{clean_content, content_fingerprint, url_hash};
pub use location::{match_location, LocationMatch};
pub use mode::detect_work_mode;
pub use timestamp::{parse_posted_at, parse_relative_phrase, ParsedTimestamp};
pub use title::bucket_title;

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

use crate::config::RulesConfig;
use crate::types::{PostedAtConfidence, RawJob, TitleBucket, WorkMode};

/// A raw job after normalization, before dedup and scoring.
#[derive(Debug, Clone)]
pub struct NormalizedJob {
    pub title: String,
    pub company: String,
    pub url: String,
    pub url_hash: String,
    pub content_fingerprint: String,
    pub title_bucket: TitleBucket,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub location_tier: Option<String>,
    pub location_points: i64,
    pub work_mode: WorkMode,
    pub posted_at: Option<DateTime<FixedOffset>>,
    pub posted_at_confidence: PostedAtConfidence,
}

/// Normalizer bound to a rule set and wall-clock timezone.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: RulesConfig,
    timezone: Tz,
}

impl Normalizer {
    pub fn new(rules: RulesConfig, timezone: Tz) -> Self {
        Self { rules, timezone }
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Normalize one raw job. Callers decide what to do with rejects.
    pub fn normalize(&self, raw: &RawJob, now: DateTime<Utc>) -> NormalizedJob {
        let title = raw.title.trim().to_string();
        let title_bucket = bucket_title(&title, &self.rules.titles);
        let company = normalize_company(&raw.company);

        let location = match_location(&raw.location_raw, &self.rules);
        let has_concrete_city = location
            .as_ref()
            .map(|m| m.city.is_some())
            .unwrap_or(false);

        let work_mode =
            detect_work_mode(&raw.content, &raw.location_raw, &self.rules.modes, has_concrete_city);

        let parsed = parse_posted_at(raw.posted_at.as_deref(), self.timezone, now);

        let (city, province, country, location_tier, location_points) = match location {
            Some(m) => (m.city, m.province, m.country, Some(m.tier), m.points),
            None => (None, None, None, None, 0),
        };

        NormalizedJob {
            url_hash: url_hash(&raw.url),
            content_fingerprint: content_fingerprint(&raw.content),
            title,
            company,
            url: raw.url.clone(),
            title_bucket,
            city,
            province,
            country,
            location_tier,
            location_points,
            work_mode,
            posted_at: parsed.at,
            posted_at_confidence: parsed.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        BandThreshold, BandsConfig, CompaniesConfig, FreshnessBracket, FreshnessConfig,
        LocationTier, LocationsConfig, ModeRule, ModesConfig, ScoreWeights, ScoringConfig,
        SourcesConfig, TitleFilters,
    };
    use chrono::TimeZone;

    fn rules() -> RulesConfig {
        let mut locations = LocationsConfig::new();
        locations.insert(
            "L1",
            LocationTier {
                label: "Toronto core".into(),
                points: 40,
                cities: vec!["Toronto".into()],
                aliases: vec!["GTA".into()],
                province: Some("Ontario".into()),
                country: Some("Canada".into()),
            },
        );

        let mut modes = ModesConfig::new();
        modes.insert("hybrid".into(), ModeRule { points: 25, keywords: vec!["hybrid".into()] });
        modes.insert("remote".into(), ModeRule { points: 30, keywords: vec!["remote".into()] });
        modes.insert("onsite".into(), ModeRule { points: 10, keywords: vec!["onsite".into()] });
        modes.insert("unknown".into(), ModeRule { points: 5, keywords: vec![] });

        RulesConfig {
            locations,
            titles: TitleFilters {
                include: vec!["software engineer".into()],
                maybe: vec!["engineer".into()],
                reject: vec!["recruiter".into()],
            },
            modes,
            scoring: ScoringConfig {
                freshness: FreshnessConfig {
                    brackets: vec![
                        FreshnessBracket { max_hours: Some(24), points: 100 },
                        FreshnessBracket { max_hours: None, points: 0 },
                    ],
                    low_confidence_cap: 50,
                },
                bands: BandsConfig {
                    top_priority: BandThreshold { min_score: 80 },
                    good_match: BandThreshold { min_score: 60 },
                    worth_a_look: BandThreshold { min_score: 0 },
                },
                weights: ScoreWeights::default(),
            },
            sources: SourcesConfig::new(),
            companies: CompaniesConfig::new(),
        }
    }

    fn normalizer() -> Normalizer {
        Normalizer::new(rules(), chrono_tz::America::Toronto)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap()
    }

    fn sample_raw() -> RawJob {
        RawJob::new(
            "greenhouse",
            "123",
            "  Software Engineer  ",
            "Acme Inc.",
            "https://boards.example.com/jobs/abc/",
        )
        .with_location("Toronto, ON")
        .with_content("We are a hybrid/remote friendly team building APIs.")
        .with_posted_at("2026-07-15T08:00:00Z")
    }

    #[test]
    fn test_full_normalization() {
        let job = normalizer().normalize(&sample_raw(), now());

        assert_eq!(job.title, "Software Engineer");
        assert_eq!(job.company, "Acme");
        assert_eq!(job.title_bucket, TitleBucket::Include);
        assert_eq!(job.city.as_deref(), Some("Toronto"));
        assert_eq!(job.province.as_deref(), Some("Ontario"));
        assert_eq!(job.location_tier.as_deref(), Some("L1"));
        assert_eq!(job.work_mode, WorkMode::Hybrid);
        assert_eq!(job.posted_at_confidence, PostedAtConfidence::High);
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let n = normalizer();
        let raw = sample_raw();
        let t = now();

        let a = n.normalize(&raw, t);
        let b = n.normalize(&raw, t);

        assert_eq!(a.url_hash, b.url_hash);
        assert_eq!(a.content_fingerprint, b.content_fingerprint);
        assert_eq!(a.title_bucket, b.title_bucket);
        assert_eq!(a.city, b.city);
        assert_eq!(a.work_mode, b.work_mode);
        assert_eq!(a.posted_at, b.posted_at);
    }

    #[test]
    fn test_reject_bucket() {
        let raw = RawJob::new("lever", "1", "Technical Recruiter", "Acme", "https://x.com/1");
        let job = normalizer().normalize(&raw, now());
        assert_eq!(job.title_bucket, TitleBucket::Reject);
    }
}
