//! Application configuration from environment variables.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

/// Default discovery queries when none are configured.
const DEFAULT_DISCOVERY_QUERIES: &[&str] = &[
    "site:boards.greenhouse.io software engineer toronto",
    "site:jobs.lever.co software engineer toronto",
    "site:jobs.ashbyhq.com software engineer canada",
    "site:apply.workable.com developer toronto",
];

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub config_dir: String,
    pub resume_path: Option<String>,
    pub port: u16,

    pub timezone: chrono_tz::Tz,
    pub dry_run: bool,

    /// Jobs bot sends alerts and digests; logs bot sends operational
    /// messages. Empty token = skip and log.
    pub telegram_jobs_token: Option<String>,
    pub telegram_logs_token: Option<String>,
    pub telegram_chat_id: String,

    pub search_api_endpoint: String,
    pub search_api_keys: Vec<String>,
    pub discovery_queries: Vec<String>,

    pub llm_api_keys: Vec<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_fallback_key: Option<String>,
    pub llm_fallback_base_url: String,
    pub llm_fallback_model: String,

    pub ai_analysis_min_score: i64,
    pub max_job_age_days: Option<i64>,
    pub use_discovered_boards: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::report_env();

        let timezone = env::var("TZ")
            .ok()
            .and_then(|name| chrono_tz::Tz::from_str(&name).ok())
            .unwrap_or(chrono_tz::America::Toronto);

        // Up to three primary LLM keys
        let mut llm_api_keys = csv_list(&env::var("LLM_API_KEYS").unwrap_or_default());
        llm_api_keys.truncate(3);

        Ok(Self {
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "jobscout.db".to_string()),
            config_dir: env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string()),
            resume_path: env::var("RESUME_PATH").ok().filter(|p| !p.is_empty()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            timezone,
            dry_run: env_flag("DRY_RUN"),
            telegram_jobs_token: env::var("TELEGRAM_JOBS_BOT_TOKEN").ok().filter(|t| !t.is_empty()),
            telegram_logs_token: env::var("TELEGRAM_LOGS_BOT_TOKEN").ok().filter(|t| !t.is_empty()),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
            search_api_endpoint: env::var("SEARCH_API_ENDPOINT")
                .unwrap_or_else(|_| "https://api.tavily.com/search".to_string()),
            search_api_keys: csv_list(&env::var("SEARCH_API_KEYS").unwrap_or_default()),
            discovery_queries: {
                let configured = csv_list(&env::var("DISCOVERY_QUERIES").unwrap_or_default());
                if configured.is_empty() {
                    DEFAULT_DISCOVERY_QUERIES.iter().map(|q| q.to_string()).collect()
                } else {
                    configured
                }
            },
            llm_api_keys,
            llm_base_url: env::var("LLM_BASE_URL").unwrap_or_default(),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "qwen2.5-72b-instruct".to_string()),
            llm_fallback_key: env::var("LLM_FALLBACK_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_fallback_base_url: env::var("LLM_FALLBACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            llm_fallback_model: env::var("LLM_FALLBACK_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            ai_analysis_min_score: env::var("AI_ANALYSIS_MIN_SCORE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            max_job_age_days: env::var("MAX_JOB_AGE_DAYS").ok().and_then(|v| v.parse().ok()),
            use_discovered_boards: !env_flag("DISABLE_DISCOVERED_BOARDS"),
        })
    }

    /// Warn about optional capabilities that are disabled.
    fn report_env() {
        let optional = [
            ("TELEGRAM_JOBS_BOT_TOKEN", "job alerts and digests will be logged, not sent"),
            ("TELEGRAM_LOGS_BOT_TOKEN", "system alerts will be logged, not sent"),
            ("SEARCH_API_KEYS", "discovery and search connectors disabled"),
            ("LLM_API_KEYS", "fit analysis disabled unless a fallback key is set"),
            ("RESUME_PATH", "fit analysis disabled"),
        ];
        for (var, consequence) in optional {
            if env::var(var).map(|v| v.is_empty()).unwrap_or(true) {
                tracing::warn!("{var} not set: {consequence}");
            }
        }
    }

    /// Short non-secret summary for /status.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "timezone": self.timezone.name(),
            "dryRun": self.dry_run,
            "telegramJobsBot": self.telegram_jobs_token.is_some(),
            "telegramLogsBot": self.telegram_logs_token.is_some(),
            "searchKeys": self.search_api_keys.len(),
            "llmKeys": self.llm_api_keys.len(),
            "llmFallback": self.llm_fallback_key.is_some(),
            "aiAnalysisMinScore": self.ai_analysis_min_score,
        })
    }
}

fn csv_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_list() {
        assert_eq!(csv_list("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(csv_list("").is_empty());
        assert!(csv_list(" , ").is_empty());
    }
}
