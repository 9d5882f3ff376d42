//! Resume-fit analyzer over streamed chat completions.
//!
//! One analysis = one key lease from the pool, a streamed request with
//! stall detection and a hard request cap, bounded retries split by
//! failure class, and a single non-retrying attempt against the fallback
//! provider when the primary is exhausted. Total failure returns `None`
//! and the pipeline moves on.

use std::time::Duration;

use futures::StreamExt;
use llm_client::{ChatRequest, LlmClient, LlmError, Message, Usage};
use tracing::{debug, warn};

use crate::ai::key_pool::KeyPool;
use crate::ai::parse::{parse_fit_response, ParsedFit};
use crate::fetch::retry::{retry_with_backoff, RetryPolicy};
use crate::normalize::clean_content;

/// Description bodies are capped at this many characters.
const MAX_DESCRIPTION_CHARS: usize = 8_000;
const TRUNCATION_MARKER: &str = "\n[description truncated]";

const SYSTEM_PROMPT: &str = r#"You are a resume-fit analyst for a job seeker. Compare the resume against the job posting and return ONLY a JSON object with this exact schema, no prose before or after:
{
  "fitScore": <number 0-100>,
  "verdict": "strong" | "moderate" | "weak" | "stretch",
  "summary": "<2-3 sentence assessment>",
  "strengths": ["..."],
  "gaps": ["..."],
  "matchedSkills": ["..."],
  "missingSkills": ["..."],
  "bonusSkills": ["..."],
  "experienceLevelMatch": "<junior|mid|senior|lead|unknown>",
  "domainRelevance": "<short phrase>",
  "recommendation": "<one sentence>",
  "tailoringTips": ["..."],
  "coverLetterPoints": ["..."]
}
Base every claim on the resume and posting text. Do not invent skills."#;

/// Analyzer configuration (endpoints, model names, timeouts).
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub primary_base_url: String,
    pub model: String,
    pub fallback_base_url: String,
    pub fallback_model: String,
    pub fallback_key: Option<String>,

    /// Abort when no chunk arrives within this window
    pub stream_timeout: Duration,

    /// Absolute cap on one request, streaming included
    pub hard_timeout: Duration,

    /// Retries per failure class against the primary
    pub max_retries: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            primary_base_url: String::new(),
            model: String::new(),
            fallback_base_url: String::new(),
            fallback_model: String::new(),
            fallback_key: None,
            stream_timeout: Duration::from_secs(60),
            hard_timeout: Duration::from_secs(12 * 60),
            max_retries: 3,
        }
    }
}

/// A completed analysis with provider metadata.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub parsed: ParsedFit,
    pub provider: String,
    pub model_used: String,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
}

/// The fit analyzer.
pub struct FitAnalyzer {
    pool: KeyPool,
    config: AnalyzerConfig,
    resume: String,
}

impl FitAnalyzer {
    pub fn new(pool: KeyPool, config: AnalyzerConfig, resume: impl Into<String>) -> Self {
        Self { pool, config, resume: resume.into() }
    }

    /// Concurrency the pipeline should run analyses at.
    pub fn concurrency(&self) -> usize {
        self.pool.concurrency()
    }

    /// Analyze one job. `None` means every avenue failed and the job
    /// proceeds without an analysis.
    pub async fn analyze(
        &self,
        title: &str,
        company: &str,
        description_html: &str,
    ) -> Option<AnalysisOutcome> {
        let description = clean_description(description_html);
        let user_prompt = build_user_prompt(&self.resume, title, company, &description);

        // Primary provider, gated on a key lease
        if self.pool.size() > 0 {
            match self.pool.acquire().await {
                Some(lease) => {
                    let key = lease.key();
                    debug!(key_slot = lease.index(), title, "analyzing with primary provider");
                    let result = self
                        .primary_attempt(&key, &user_prompt)
                        .await;
                    drop(lease);

                    match result {
                        Ok((content, usage)) => {
                            if let Some(parsed) = parse_fit_response(&content) {
                                return Some(self.outcome(parsed, "primary", &self.config.model, usage));
                            }
                            warn!(title, "primary response failed to parse, trying fallback");
                        }
                        Err(e) => {
                            warn!(title, error = %e, "primary provider failed, trying fallback");
                        }
                    }
                }
                None => {
                    warn!(title, "key acquisition timed out");
                    return None;
                }
            }
        }

        // Fallback provider: one attempt, no retries
        let fallback_key = self.config.fallback_key.as_deref()?;
        match self.request_streamed(fallback_key, &self.config.fallback_base_url, &self.config.fallback_model, &user_prompt).await {
            Ok((content, usage)) => parse_fit_response(&content)
                .map(|parsed| self.outcome(parsed, "fallback", &self.config.fallback_model, usage)),
            Err(e) => {
                warn!(title, error = %e, "fallback provider failed");
                None
            }
        }
    }

    fn outcome(
        &self,
        parsed: ParsedFit,
        provider: &str,
        model: &str,
        usage: Option<Usage>,
    ) -> AnalysisOutcome {
        AnalysisOutcome {
            parsed,
            provider: provider.to_string(),
            model_used: model.to_string(),
            prompt_tokens: usage.as_ref().map(|u| u.prompt_tokens as i64),
            completion_tokens: usage.as_ref().map(|u| u.completion_tokens as i64),
        }
    }

    /// Primary call with the split retry policy: 429/502/503 back off at
    /// `2000·(attempt+1)` ms, transient network failures at
    /// `1000·(attempt+1)` ms, everything else fails immediately.
    async fn primary_attempt(
        &self,
        key: &str,
        user_prompt: &str,
    ) -> Result<(String, Option<Usage>), LlmError> {
        let policy: RetryPolicy<LlmError> = RetryPolicy {
            max_retries: self.config.max_retries,
            is_retryable: Box::new(|e: &LlmError| {
                e.is_retryable_status() || e.is_retryable_network()
            }),
            backoff: Box::new(|attempt, e: &LlmError| {
                if e.is_retryable_status() {
                    Duration::from_millis(2_000 * (attempt as u64 + 1))
                } else {
                    Duration::from_millis(1_000 * (attempt as u64 + 1))
                }
            }),
        };

        retry_with_backoff(&policy, |_| {
            self.request_streamed(key, &self.config.primary_base_url, &self.config.model, user_prompt)
        })
        .await
    }

    /// One streamed request: open the stream, accumulate deltas, watch
    /// for stalls, and enforce the hard cap over the whole call.
    async fn request_streamed(
        &self,
        key: &str,
        base_url: &str,
        model: &str,
        user_prompt: &str,
    ) -> Result<(String, Option<Usage>), LlmError> {
        let client = LlmClient::new(key).with_base_url(base_url);
        let request = ChatRequest::new(model)
            .message(Message::system(SYSTEM_PROMPT))
            .message(Message::user(user_prompt))
            .temperature(0.3)
            .max_tokens(2_048);

        let work = async {
            let mut stream = client.chat_completion_stream(request).await?;
            let mut content = String::new();
            let mut usage: Option<Usage> = None;

            loop {
                let next = tokio::time::timeout(self.config.stream_timeout, stream.next()).await;
                match next {
                    // Stall: dropping the stream cancels the reader
                    Err(_) => {
                        return Err(LlmError::Stalled(self.config.stream_timeout.as_millis() as u64))
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => return Err(e),
                    Ok(Some(Ok(chunk))) => {
                        if let Some(u) = chunk.usage {
                            usage = Some(u);
                        }
                        if chunk.done {
                            break;
                        }
                        content.push_str(&chunk.delta);
                    }
                }
            }
            Ok((content, usage))
        };

        match tokio::time::timeout(self.config.hard_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Api {
                status: 408,
                body: format!("hard request cap {}s exceeded", self.config.hard_timeout.as_secs()),
            }),
        }
    }
}

/// Strip HTML, decode entities, collapse whitespace, and cap the length.
pub fn clean_description(description_html: &str) -> String {
    let mut cleaned = clean_content(description_html);
    if cleaned.len() > MAX_DESCRIPTION_CHARS {
        let mut end = MAX_DESCRIPTION_CHARS;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
        cleaned.push_str(TRUNCATION_MARKER);
    }
    cleaned
}

fn build_user_prompt(resume: &str, title: &str, company: &str, description: &str) -> String {
    format!(
        "=== RESUME ===\n{resume}\n\n=== JOB POSTING ===\nTitle: {title}\nCompany: {company}\n\n{description}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_description_strips_and_truncates() {
        let short = clean_description("<p>Build &amp; ship</p>");
        assert_eq!(short, "Build & ship");

        let long_html = format!("<div>{}</div>", "word ".repeat(3_000));
        let cleaned = clean_description(&long_html);
        assert!(cleaned.len() <= MAX_DESCRIPTION_CHARS + TRUNCATION_MARKER.len());
        assert!(cleaned.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_user_prompt_layout() {
        let prompt = build_user_prompt("resume body", "Engineer", "Acme", "do things");
        assert!(prompt.contains("=== RESUME ===\nresume body"));
        assert!(prompt.contains("Title: Engineer"));
        assert!(prompt.contains("Company: Acme"));
        assert!(prompt.contains("do things"));
    }

    #[test]
    fn test_system_prompt_names_required_fields() {
        for field in ["fitScore", "verdict", "summary", "tailoringTips", "coverLetterPoints"] {
            assert!(SYSTEM_PROMPT.contains(field), "{field} missing from system prompt");
        }
    }

    #[tokio::test]
    async fn test_no_keys_and_no_fallback_returns_none() {
        let analyzer = FitAnalyzer::new(
            KeyPool::new(vec![], Duration::from_millis(50)),
            AnalyzerConfig::default(),
            "resume",
        );
        let outcome = analyzer.analyze("Engineer", "Acme", "<p>body</p>").await;
        assert!(outcome.is_none());
    }
}
