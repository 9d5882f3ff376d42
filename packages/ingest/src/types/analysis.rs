//! Resume-fit analysis results.

use serde::{Deserialize, Serialize};

/// Overall verdict from the fit analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitVerdict {
    Strong,
    Moderate,
    Weak,
    Stretch,
}

impl FitVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitVerdict::Strong => "strong",
            FitVerdict::Moderate => "moderate",
            FitVerdict::Weak => "weak",
            FitVerdict::Stretch => "stretch",
        }
    }

    /// Total mapping from model/stored strings; unknown values read as
    /// stretch (the weakest claim).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "strong" => FitVerdict::Strong,
            "moderate" => FitVerdict::Moderate,
            "weak" => FitVerdict::Weak,
            _ => FitVerdict::Stretch,
        }
    }
}

/// At most one per canonical job: how well the resume fits the posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitAnalysis {
    pub canonical_job_id: i64,

    /// 0–100 after clamping
    pub fit_score: i64,
    pub verdict: FitVerdict,
    pub summary: String,

    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub bonus_skills: Vec<String>,
    pub tailoring_tips: Vec<String>,
    pub cover_letter_points: Vec<String>,

    pub experience_level_match: String,
    pub domain_relevance: String,
    pub recommendation: String,

    /// Which provider produced the analysis ("primary" | "fallback")
    pub provider: String,
    pub model_used: String,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
}
