//! Posting timestamp parsing and wall-clock formatting.
//!
//! Sources report times as RFC 3339, epoch seconds or milliseconds, bare
//! dates, short English dates, or relative phrases. Everything parseable
//! is converted to the configured timezone with the offset that was in
//! effect at that instant (DST-correct); failures yield a null timestamp
//! with low confidence.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::types::PostedAtConfidence;

/// A parsed posting timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedTimestamp {
    pub at: Option<DateTime<FixedOffset>>,
    pub confidence: PostedAtConfidence,
}

impl ParsedTimestamp {
    fn none() -> Self {
        Self { at: None, confidence: PostedAtConfidence::Low }
    }
}

/// Parse a source-reported timestamp into the configured timezone.
///
/// Full datetimes (RFC 3339, epoch, naive datetime) are high confidence;
/// date-only forms and relative phrases are medium; anything unparseable
/// is null with low confidence.
pub fn parse_posted_at(raw: Option<&str>, tz: Tz, now: DateTime<Utc>) -> ParsedTimestamp {
    let Some(raw) = raw else {
        return ParsedTimestamp::none();
    };
    let text = raw.trim();
    if text.is_empty() {
        return ParsedTimestamp::none();
    }

    if let Some(instant) = parse_absolute(text) {
        return ParsedTimestamp {
            at: Some(to_wall_clock(instant, tz)),
            confidence: PostedAtConfidence::High,
        };
    }

    if let Some(date) = parse_date_only(text, now) {
        return ParsedTimestamp {
            at: date_midnight(date, tz),
            confidence: PostedAtConfidence::Medium,
        };
    }

    if let Some(instant) = parse_relative_phrase(text, now) {
        return ParsedTimestamp {
            at: Some(to_wall_clock(instant, tz)),
            confidence: PostedAtConfidence::Medium,
        };
    }

    ParsedTimestamp::none()
}

/// Convert a UTC instant to the target zone with its numeric offset.
pub fn to_wall_clock(instant: DateTime<Utc>, tz: Tz) -> DateTime<FixedOffset> {
    instant.with_timezone(&tz).fixed_offset()
}

/// Full-precision formats: RFC 3339, epoch seconds/milliseconds, naive
/// datetimes.
fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }

    // Epoch milliseconds (13 digits) or seconds (10 digits)
    if text.chars().all(|c| c.is_ascii_digit()) {
        if text.len() >= 12 {
            if let Ok(ms) = text.parse::<i64>() {
                return DateTime::from_timestamp_millis(ms);
            }
        } else if text.len() >= 9 {
            if let Ok(secs) = text.parse::<i64>() {
                return DateTime::from_timestamp(secs, 0);
            }
        }
    }

    // Naive datetimes are taken as UTC
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    None
}

/// Date-only forms: `2026-07-01`, `Jul 1, 2026`, `July 1`, `Jul 1`.
fn parse_date_only(text: &str, now: DateTime<Utc>) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%b %d, %Y", "%B %d, %Y", "%b %e, %Y", "%B %e, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    // Short month-day without a year: assume this year unless that lands
    // in the future, then last year
    let with_year = format!("{} {}", text, now.year());
    for format in ["%b %d %Y", "%B %d %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&with_year, format) {
            if date > now.date_naive() {
                return date.with_year(now.year() - 1);
            }
            return Some(date);
        }
    }

    None
}

/// Relative English phrases: `today`, `yesterday`, `N hours/days/weeks ago`.
pub fn parse_relative_phrase(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim().to_lowercase();

    if text == "today" || text == "just now" {
        return Some(now);
    }
    if text == "yesterday" {
        return Some(now - chrono::Duration::days(1));
    }

    let pattern = Regex::new(r"^(\d+)\+?\s*(hour|day|week|month)s?\s+ago$").unwrap();
    let captures = pattern.captures(&text)?;
    let count: i64 = captures[1].parse().ok()?;
    let delta = match &captures[2] {
        "hour" => chrono::Duration::hours(count),
        "day" => chrono::Duration::days(count),
        "week" => chrono::Duration::weeks(count),
        "month" => chrono::Duration::days(count * 30),
        _ => return None,
    };
    Some(now - delta)
}

fn date_midnight(date: NaiveDate, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    // On DST-transition days midnight can be ambiguous or missing
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}
