//! Scoring and banding of normalized jobs.
//!
//! `score = freshness + location + mode`, each term read off the scoring
//! config. Banding is a pure function of the total.

use chrono::{DateTime, Utc};

use crate::config::{ModesConfig, ScoringConfig};
use crate::normalize::NormalizedJob;
use crate::types::{PostedAtConfidence, ScoreBand, Scores};

/// Score a normalized job.
///
/// `first_seen_at` stands in for the posting time when the source gave
/// none. Future-dated postings clamp to zero hours old.
pub fn score_job(
    job: &NormalizedJob,
    scoring: &ScoringConfig,
    modes: &ModesConfig,
    now: DateTime<Utc>,
    first_seen_at: DateTime<Utc>,
) -> Scores {
    let freshness = score_freshness(
        job.posted_at.map(|t| t.with_timezone(&Utc)).unwrap_or(first_seen_at),
        job.posted_at_confidence,
        scoring,
        now,
    );
    let location = job.location_points;
    let mode = score_mode(job, modes);

    let total = freshness + location + mode;
    Scores {
        total,
        freshness,
        location,
        mode,
        band: band_for(total, scoring),
    }
}

fn score_freshness(
    posted_at: DateTime<Utc>,
    confidence: PostedAtConfidence,
    scoring: &ScoringConfig,
    now: DateTime<Utc>,
) -> i64 {
    let hours_ago = (now - posted_at).num_hours().max(0);

    let mut brackets = scoring.freshness.brackets.clone();
    // Ascending by max_hours, catch-all (None) last
    brackets.sort_by_key(|b| b.max_hours.unwrap_or(i64::MAX));

    let mut points = 0;
    for bracket in &brackets {
        match bracket.max_hours {
            Some(max_hours) if hours_ago > max_hours => continue,
            _ => {
                points = bracket.points;
                break;
            }
        }
    }

    if confidence == PostedAtConfidence::Low {
        points = points.min(scoring.freshness.low_confidence_cap);
    }
    points
}

fn score_mode(job: &NormalizedJob, modes: &ModesConfig) -> i64 {
    modes
        .get(job.work_mode.as_str())
        .or_else(|| modes.get("unknown"))
        .map(|rule| rule.points)
        .unwrap_or(0)
}

/// The highest band whose threshold the total clears; the lowest band is
/// the default.
pub fn band_for(total: i64, scoring: &ScoringConfig) -> ScoreBand {
    if total >= scoring.bands.top_priority.min_score {
        ScoreBand::TopPriority
    } else if total >= scoring.bands.good_match.min_score {
        ScoreBand::GoodMatch
    } else {
        ScoreBand::WorthALook
    }
}
