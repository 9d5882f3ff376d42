//! Morning/evening digests and the weekly report.

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::info;

use jobscout_ingest::stores::{JobFilter, JobStore};
use jobscout_ingest::types::{CanonicalJob, JobStatus, ScoreBand, TitleBucket};

use super::{escape, TelegramBot};

/// Which digest slot is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Morning,
    Evening,
}

impl DigestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestKind::Morning => "morning",
            DigestKind::Evening => "evening",
        }
    }

    /// How far back the digest looks.
    fn window(&self) -> Duration {
        match self {
            // Morning covers the evening gap and overnight
            DigestKind::Morning => Duration::hours(15),
            DigestKind::Evening => Duration::hours(10),
        }
    }
}

/// Render and send one digest. `force_all` widens the window to a week.
pub async fn send_digest(
    store: &JobStore,
    bot: &TelegramBot,
    kind: DigestKind,
    force_all: bool,
) -> Result<usize> {
    let window = if force_all { Duration::days(7) } else { kind.window() };
    let since = Utc::now() - window;

    let jobs = store
        .list_jobs(&JobFilter {
            limit: 60,
            bucket: Some(TitleBucket::Include),
            status: Some(JobStatus::Active),
            since: Some(since),
            ..Default::default()
        })
        .await?;

    if jobs.is_empty() {
        info!(kind = kind.as_str(), "no jobs for digest");
        bot.send(&format!("No new jobs for the {} digest.", kind.as_str()), &[]).await.ok();
        return Ok(0);
    }

    let text = render_digest(kind, &jobs);
    bot.send(&text, &[]).await.ok();
    Ok(jobs.len())
}

/// Band-grouped, score-sorted digest body.
pub fn render_digest(kind: DigestKind, jobs: &[CanonicalJob]) -> String {
    let mut sections = vec![format!(
        "<b>{} digest</b> — {} new job{}",
        capitalize(kind.as_str()),
        jobs.len(),
        if jobs.len() == 1 { "" } else { "s" }
    )];

    for band in [ScoreBand::TopPriority, ScoreBand::GoodMatch, ScoreBand::WorthALook] {
        let in_band: Vec<&CanonicalJob> = jobs.iter().filter(|j| j.score_band == band).collect();
        if in_band.is_empty() {
            continue;
        }
        let mut lines = vec![format!("\n<b>{}</b> ({})", band.as_str(), in_band.len())];
        for job in in_band.iter().take(10) {
            lines.push(format!(
                "• {} — {} ({}) {}",
                escape(&job.title),
                escape(&job.company),
                job.score,
                escape(&job.url)
            ));
        }
        if in_band.len() > 10 {
            lines.push(format!("  …and {} more", in_band.len() - 10));
        }
        sections.push(lines.join("\n"));
    }

    sections.join("\n")
}

/// Send the weekly summary via the logs bot.
pub async fn send_weekly_report(store: &JobStore, bot: &TelegramBot) -> Result<()> {
    let summary = store.weekly_summary(Utc::now()).await?;
    let text = format!(
        "<b>Weekly report</b>\nNew jobs: {}\nTop priority: {}\nApplied: {}\nDismissed: {}\nAnalyses: {}",
        summary.jobs_new, summary.top_priority, summary.applied, summary.dismissed, summary.analyses
    );
    bot.send(&text, &[]).await.ok();
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
