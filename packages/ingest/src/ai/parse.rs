//! Fit-analysis response parsing.
//!
//! Models are instructed to return a bare JSON object, but real output
//! arrives wrapped in think-blocks, code fences, or with fields missing.
//! Cleaning strips the wrappers; parsing requires `fitScore`, `verdict`,
//! and `summary` and defaults everything else.

use serde::Deserialize;

use llm_client::{strip_code_blocks, strip_think_blocks};

use crate::types::FitVerdict;

/// Parsed analyzer output, before provider metadata is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFit {
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
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitResponseRaw {
    fit_score: Option<f64>,
    verdict: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    gaps: Vec<String>,
    #[serde(default)]
    matched_skills: Vec<String>,
    #[serde(default)]
    missing_skills: Vec<String>,
    #[serde(default)]
    bonus_skills: Vec<String>,
    #[serde(default)]
    tailoring_tips: Vec<String>,
    #[serde(default)]
    cover_letter_points: Vec<String>,
    experience_level_match: Option<String>,
    domain_relevance: Option<String>,
    recommendation: Option<String>,
}

/// Parse an analyzer response. Returns `None` when the body is not JSON
/// or a required field is absent.
pub fn parse_fit_response(response: &str) -> Option<ParsedFit> {
    let without_think = strip_think_blocks(response);
    let cleaned = strip_code_blocks(&without_think);

    let raw: FitResponseRaw = serde_json::from_str(cleaned).ok()?;

    let fit_score = raw.fit_score?;
    let verdict = raw.verdict?;
    let summary = raw.summary?;

    Some(ParsedFit {
        fit_score: (fit_score.round() as i64).clamp(0, 100),
        verdict: FitVerdict::parse(&verdict),
        summary,
        strengths: raw.strengths,
        gaps: raw.gaps,
        matched_skills: raw.matched_skills,
        missing_skills: raw.missing_skills,
        bonus_skills: raw.bonus_skills,
        tailoring_tips: raw.tailoring_tips,
        cover_letter_points: raw.cover_letter_points,
        experience_level_match: raw.experience_level_match.unwrap_or_else(|| "unknown".to_string()),
        domain_relevance: raw.domain_relevance.unwrap_or_default(),
        recommendation: raw.recommendation.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_complete_response() {
        let response = r#"{
            "fitScore": 87,
            "verdict": "strong",
            "summary": "Close match.",
            "strengths": ["rust", "distributed systems"],
            "gaps": ["kubernetes"],
            "matchedSkills": ["rust"],
            "missingSkills": [],
            "bonusSkills": ["sql"],
            "tailoringTips": ["lead with backend work"],
            "coverLetterPoints": ["mention scale"],
            "experienceLevelMatch": "senior",
            "domainRelevance": "high",
            "recommendation": "apply"
        }"#;

        let parsed = parse_fit_response(response).unwrap();
        assert_eq!(parsed.fit_score, 87);
        assert_eq!(parsed.verdict, FitVerdict::Strong);
        assert_eq!(parsed.strengths.len(), 2);
        assert_eq!(parsed.experience_level_match, "senior");
    }

    #[test]
    fn test_strips_think_and_fences() {
        let response = "<think>scoring this carefully</think>```json\n{\"fitScore\": 55, \"verdict\": \"moderate\", \"summary\": \"ok\"}\n```";
        let parsed = parse_fit_response(response).unwrap();
        assert_eq!(parsed.fit_score, 55);
        assert_eq!(parsed.verdict, FitVerdict::Moderate);
    }

    #[test]
    fn test_missing_required_fields() {
        assert!(parse_fit_response(r#"{"verdict": "weak", "summary": "x"}"#).is_none());
        assert!(parse_fit_response(r#"{"fitScore": 10, "summary": "x"}"#).is_none());
        assert!(parse_fit_response(r#"{"fitScore": 10, "verdict": "weak"}"#).is_none());
        assert!(parse_fit_response("not json at all").is_none());
    }

    #[test]
    fn test_clamps_and_rounds_score() {
        let parsed =
            parse_fit_response(r#"{"fitScore": 123.7, "verdict": "strong", "summary": "x"}"#)
                .unwrap();
        assert_eq!(parsed.fit_score, 100);

        let parsed =
            parse_fit_response(r#"{"fitScore": -4, "verdict": "weak", "summary": "x"}"#).unwrap();
        assert_eq!(parsed.fit_score, 0);

        let parsed =
            parse_fit_response(r#"{"fitScore": 66.4, "verdict": "weak", "summary": "x"}"#).unwrap();
        assert_eq!(parsed.fit_score, 66);
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let parsed =
            parse_fit_response(r#"{"fitScore": 40, "verdict": "stretch", "summary": "thin"}"#)
                .unwrap();
        assert!(parsed.strengths.is_empty());
        assert!(parsed.cover_letter_points.is_empty());
        assert_eq!(parsed.experience_level_match, "unknown");
        assert_eq!(parsed.domain_relevance, "");
    }

    #[test]
    fn test_unknown_verdict_maps_to_stretch() {
        let parsed =
            parse_fit_response(r#"{"fitScore": 40, "verdict": "amazing", "summary": "x"}"#)
                .unwrap();
        assert_eq!(parsed.verdict, FitVerdict::Stretch);
    }
}
