//! Test doubles and fixture builders shared by unit and integration
//! tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::{
    BandThreshold, BandsConfig, CompaniesConfig, FreshnessBracket, FreshnessConfig, LocationTier,
    LocationsConfig, ModeRule, ModesConfig, RulesConfig, ScoreWeights, ScoringConfig,
    SourcesConfig, TitleFilters,
};
use crate::connectors::ConnectorResult;
use crate::pipeline::Notifier;
use crate::types::{CanonicalJob, FitAnalysis, RawJob};

/// Notifier that records every call instead of sending anything.
#[derive(Default)]
pub struct RecordingNotifier {
    pub job_alerts: Mutex<Vec<(i64, bool)>>,
    pub system_alerts: Mutex<Vec<String>>,
    /// When false, job alert sends report failure
    pub succeed: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self { succeed: true, ..Default::default() }
    }

    pub fn failing() -> Self {
        Self { succeed: false, ..Default::default() }
    }

    pub fn job_alert_count(&self) -> usize {
        self.job_alerts.lock().unwrap().len()
    }

    pub fn system_alert_count(&self) -> usize {
        self.system_alerts.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_job_alert(&self, job: &CanonicalJob, analysis: Option<&FitAnalysis>) -> bool {
        self.job_alerts.lock().unwrap().push((job.id, analysis.is_some()));
        self.succeed
    }

    async fn send_system_alert(&self, message: &str) -> bool {
        self.system_alerts.lock().unwrap().push(message.to_string());
        self.succeed
    }
}

/// A full rules config exercising every normalizer path.
pub fn test_rules() -> RulesConfig {
    let mut locations = LocationsConfig::new();
    locations.insert(
        "L1",
        LocationTier {
            label: "Toronto core".into(),
            points: 40,
            cities: vec!["Toronto".into(), "North York".into()],
            aliases: vec!["GTA".into()],
            province: Some("Ontario".into()),
            country: Some("Canada".into()),
        },
    );
    locations.insert(
        "L2",
        LocationTier {
            label: "Ontario hubs".into(),
            points: 30,
            cities: vec!["Ottawa".into(), "Waterloo".into()],
            aliases: vec![],
            province: Some("Ontario".into()),
            country: Some("Canada".into()),
        },
    );
    locations.insert(
        "L5",
        LocationTier {
            label: "Remote Canada".into(),
            points: 15,
            cities: vec![],
            aliases: vec!["remote - canada".into(), "remote (canada)".into()],
            province: None,
            country: None,
        },
    );

    let mut modes = ModesConfig::new();
    modes.insert("hybrid".into(), ModeRule { points: 25, keywords: vec!["hybrid".into()] });
    modes.insert(
        "remote".into(),
        ModeRule { points: 30, keywords: vec!["remote".into(), "work from home".into()] },
    );
    modes.insert(
        "onsite".into(),
        ModeRule { points: 10, keywords: vec!["onsite".into(), "on-site".into()] },
    );
    modes.insert("unknown".into(), ModeRule { points: 5, keywords: vec![] });

    RulesConfig {
        locations,
        titles: TitleFilters {
            include: vec!["software engineer".into(), "developer".into()],
            maybe: vec!["engineer".into()],
            reject: vec!["recruiter".into(), "sales".into()],
        },
        modes,
        scoring: ScoringConfig {
            freshness: FreshnessConfig {
                brackets: vec![
                    FreshnessBracket { max_hours: Some(24), points: 100 },
                    FreshnessBracket { max_hours: Some(48), points: 80 },
                    FreshnessBracket { max_hours: Some(168), points: 40 },
                    FreshnessBracket { max_hours: None, points: 0 },
                ],
                low_confidence_cap: 50,
            },
            bands: BandsConfig {
                top_priority: BandThreshold { min_score: 140 },
                good_match: BandThreshold { min_score: 100 },
                worth_a_look: BandThreshold { min_score: 0 },
            },
            weights: ScoreWeights { freshness: 1.0, location: 1.0, mode: 1.0 },
        },
        sources: SourcesConfig::new(),
        companies: CompaniesConfig::new(),
    }
}

/// A raw job that lands in the include bucket with an L1 location.
pub fn raw_job(source: &str, id: &str, url: &str) -> RawJob {
    RawJob::new(source, id, "Software Engineer", "Acme Inc.", url)
        .with_location("Toronto, ON")
        .with_content("We build APIs. Hybrid schedule, three days in office.")
}

/// Wrap raw jobs as one successful connector result.
pub fn connector_result(source: &str, jobs: Vec<RawJob>) -> ConnectorResult {
    ConnectorResult::ok(source, "acme", jobs, 120)
}
