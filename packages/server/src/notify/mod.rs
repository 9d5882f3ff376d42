//! Notifications: Telegram alerts, retry queue, digests.

pub mod digest;
pub mod telegram;

pub use telegram::{ActionButton, TelegramBot};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use jobscout_ingest::pipeline::Notifier;
use jobscout_ingest::stores::JobStore;
use jobscout_ingest::types::{CanonicalJob, FitAnalysis};

use crate::config::Config;

/// Retries are dropped after this many failed attempts.
const MAX_ALERT_RETRIES: i64 = 5;

/// Base delay for the exponential retry schedule.
const RETRY_BASE_SECS: i64 = 60;

/// Telegram-backed notifier: job alerts via the jobs bot, operational
/// messages via the logs bot, failed sends parked in the retry queue.
pub struct TelegramNotifier {
    jobs_bot: TelegramBot,
    logs_bot: TelegramBot,
    store: JobStore,
}

impl TelegramNotifier {
    pub fn new(config: &Config, store: JobStore) -> Self {
        Self {
            jobs_bot: TelegramBot::new(
                "jobs",
                config.telegram_jobs_token.clone(),
                config.telegram_chat_id.clone(),
                config.dry_run,
            ),
            logs_bot: TelegramBot::new(
                "logs",
                config.telegram_logs_token.clone(),
                config.telegram_chat_id.clone(),
                config.dry_run,
            ),
            store,
        }
    }

    pub fn jobs_bot(&self) -> &TelegramBot {
        &self.jobs_bot
    }

    pub fn logs_bot(&self) -> &TelegramBot {
        &self.logs_bot
    }

    async fn send_or_queue(&self, bot_name: &str, text: &str, buttons: &[ActionButton]) -> bool {
        let bot = if bot_name == "logs" { &self.logs_bot } else { &self.jobs_bot };
        match bot.send(text, buttons).await {
            Ok(sent) => sent,
            Err(e) => {
                warn!(bot = bot_name, error = %e, "send failed, queueing for retry");
                let next = Utc::now() + Duration::seconds(RETRY_BASE_SECS);
                if let Err(e) = self.store.enqueue_retry(text, bot_name, next, Utc::now()).await {
                    warn!(error = %e, "failed to enqueue retry");
                }
                false
            }
        }
    }

    /// Re-send every due retry-queue item. Returns `(sent, dropped)`.
    pub async fn flush_retries(&self) -> anyhow::Result<(usize, usize)> {
        let now = Utc::now();
        let due = self.store.due_retries(now).await?;
        let mut sent = 0;
        let mut dropped = 0;

        for item in due {
            let bot = if item.bot == "logs" { &self.logs_bot } else { &self.jobs_bot };
            match bot.send(&item.message, &[]).await {
                Ok(_) => {
                    self.store.remove_retry(item.id).await?;
                    sent += 1;
                }
                Err(e) if item.retry_count + 1 >= MAX_ALERT_RETRIES => {
                    warn!(id = item.id, error = %e, "dropping alert after max retries");
                    self.store.remove_retry(item.id).await?;
                    dropped += 1;
                }
                Err(_) => {
                    let backoff =
                        Duration::seconds(RETRY_BASE_SECS * 2i64.pow(item.retry_count as u32 + 1));
                    self.store.bump_retry(item.id, now + backoff).await?;
                }
            }
        }

        if sent > 0 || dropped > 0 {
            info!(sent, dropped, "retry queue flushed");
        }
        Ok((sent, dropped))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_job_alert(&self, job: &CanonicalJob, analysis: Option<&FitAnalysis>) -> bool {
        let text = render_job_alert(job, analysis);
        let buttons = vec![
            ActionButton::new("Applied", format!("applied_{}", job.id)),
            ActionButton::new("Skip", format!("skip_{}", job.id)),
        ];
        self.send_or_queue("jobs", &text, &buttons).await
    }

    async fn send_system_alert(&self, message: &str) -> bool {
        self.send_or_queue("logs", message, &[]).await
    }
}

/// Render one job alert as Telegram HTML.
pub fn render_job_alert(job: &CanonicalJob, analysis: Option<&FitAnalysis>) -> String {
    let mut lines = vec![
        format!("<b>{}</b> at <b>{}</b>", escape(&job.title), escape(&job.company)),
        format!(
            "Score {} ({}) · {}{}",
            job.score,
            job.score_band.as_str(),
            job.work_mode.as_str(),
            job.city.as_deref().map(|c| format!(" · {c}")).unwrap_or_default()
        ),
    ];

    if job.is_reposted {
        lines.push("Repost of an earlier listing".to_string());
    }

    if let Some(analysis) = analysis {
        lines.push(format!(
            "Fit {}/100 ({}) — {}",
            analysis.fit_score,
            analysis.verdict.as_str(),
            escape(&analysis.summary)
        ));
        if !analysis.strengths.is_empty() {
            lines.push(format!("Strengths: {}", escape(&analysis.strengths.join(", "))));
        }
    }

    lines.push(escape(&job.url));
    lines.join("\n")
}

/// Escape the three characters Telegram HTML cares about.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use jobscout_ingest::types::{
        FitVerdict, JobStatus, PostedAtConfidence, ScoreBand, TitleBucket, WorkMode,
    };

    fn job() -> CanonicalJob {
        CanonicalJob {
            id: 7,
            raw_job_id: None,
            source: "lever".into(),
            title: "Software Engineer <Platform>".into(),
            company: "Acme & Co".into(),
            url: "https://jobs.lever.co/acme/1".into(),
            url_hash: "h".into(),
            content_fingerprint: "f".into(),
            city: Some("Toronto".into()),
            province: Some("Ontario".into()),
            country: Some("Canada".into()),
            location_tier: Some("L1".into()),
            work_mode: WorkMode::Hybrid,
            title_bucket: TitleBucket::Include,
            score: 165,
            score_freshness: 100,
            score_location: 40,
            score_mode: 25,
            score_band: ScoreBand::TopPriority,
            posted_at: None,
            posted_at_confidence: PostedAtConfidence::Low,
            first_seen_at: Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap(),
            status: JobStatus::Active,
            is_backfill: false,
            is_reposted: false,
            original_post_date: None,
        }
    }

    #[test]
    fn test_render_escapes_html() {
        let text = render_job_alert(&job(), None);
        assert!(text.contains("&lt;Platform&gt;"));
        assert!(text.contains("Acme &amp; Co"));
        assert!(text.contains("topPriority"));
        assert!(text.contains("https://jobs.lever.co/acme/1"));
    }

    #[test]
    fn test_render_includes_analysis() {
        let analysis = FitAnalysis {
            canonical_job_id: 7,
            fit_score: 87,
            verdict: FitVerdict::Strong,
            summary: "Great match".into(),
            strengths: vec!["rust".into()],
            gaps: vec![],
            matched_skills: vec![],
            missing_skills: vec![],
            bonus_skills: vec![],
            tailoring_tips: vec![],
            cover_letter_points: vec![],
            experience_level_match: "senior".into(),
            domain_relevance: String::new(),
            recommendation: String::new(),
            provider: "primary".into(),
            model_used: "m".into(),
            prompt_tokens: None,
            completion_tokens: None,
        };
        let text = render_job_alert(&job(), Some(&analysis));
        assert!(text.contains("Fit 87/100 (strong)"));
        assert!(text.contains("Strengths: rust"));
    }
}
