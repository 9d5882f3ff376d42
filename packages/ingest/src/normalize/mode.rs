//! Work-mode detection over posting text.

use crate::config::ModesConfig;
use crate::types::WorkMode;

/// Detect the work mode from the posting body and raw location.
///
/// `has_concrete_city` is whether location matching found a non-remote
/// city; remote keywords combined with a concrete city read as hybrid.
pub fn detect_work_mode(
    content: &str,
    location_raw: &str,
    modes: &ModesConfig,
    has_concrete_city: bool,
) -> WorkMode {
    let haystack = format!("{} {}", content, location_raw).to_lowercase();

    let hit = |mode: &str| {
        modes
            .get(mode)
            .map(|rule| rule.keywords.iter().any(|kw| haystack.contains(&kw.to_lowercase())))
            .unwrap_or(false)
    };

    let hybrid = hit("hybrid");
    let remote = hit("remote");
    let onsite = hit("onsite");

    if hybrid {
        WorkMode::Hybrid
    } else if remote && (onsite || has_concrete_city) {
        WorkMode::Hybrid
    } else if remote {
        WorkMode::Remote
    } else if onsite {
        WorkMode::Onsite
    } else {
        WorkMode::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeRule;

    fn modes() -> ModesConfig {
        let mut modes = ModesConfig::new();
        modes.insert(
            "hybrid".into(),
            ModeRule { points: 25, keywords: vec!["hybrid".into(), "days in office".into()] },
        );
        modes.insert(
            "remote".into(),
            ModeRule {
                points: 30,
                keywords: vec!["remote".into(), "work from home".into(), "wfh".into()],
            },
        );
        modes.insert(
            "onsite".into(),
            ModeRule { points: 10, keywords: vec!["on-site".into(), "onsite".into(), "in office".into()] },
        );
        modes.insert("unknown".into(), ModeRule { points: 5, keywords: vec![] });
        modes
    }

    #[test]
    fn test_hybrid_keyword_wins() {
        let mode = detect_work_mode("hybrid schedule, remote days", "Toronto", &modes(), true);
        assert_eq!(mode, WorkMode::Hybrid);
    }

    #[test]
    fn test_remote_plus_concrete_city_is_hybrid() {
        // Remote-friendly posting anchored to a concrete city
        let mode = detect_work_mode("flexible, remote friendly team", "Toronto, ON", &modes(), true);
        assert_eq!(mode, WorkMode::Hybrid);
    }

    #[test]
    fn test_remote_plus_onsite_keyword_is_hybrid() {
        let mode = detect_work_mode("remote ok, some onsite expected", "", &modes(), false);
        assert_eq!(mode, WorkMode::Hybrid);
    }

    #[test]
    fn test_remote_only() {
        let mode = detect_work_mode("fully remote anywhere", "", &modes(), false);
        assert_eq!(mode, WorkMode::Remote);
    }

    #[test]
    fn test_onsite_only() {
        let mode = detect_work_mode("this role is onsite", "Toronto", &modes(), true);
        assert_eq!(mode, WorkMode::Onsite);
    }

    #[test]
    fn test_no_keywords() {
        let mode = detect_work_mode("build great software", "Toronto", &modes(), true);
        assert_eq!(mode, WorkMode::Unknown);
    }
}
