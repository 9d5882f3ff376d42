//! Location tier matching.

use crate::config::RulesConfig;

/// Result of matching a raw location against the configured tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationMatch {
    /// Tier key (e.g. "L1")
    pub tier: String,
    pub points: i64,
    /// Matched city; None for remote-style tiers
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
}

/// Match a raw location string against the tiers, highest points first.
///
/// Matching is substring over the lowercased input against each tier's
/// cities and aliases. Remote tiers (no configured province) yield
/// neither city nor province.
pub fn match_location(location_raw: &str, rules: &RulesConfig) -> Option<LocationMatch> {
    let haystack = location_raw.to_lowercase();
    if haystack.trim().is_empty() {
        return None;
    }

    for (key, tier) in rules.tiers_by_points() {
        let city_hit = tier
            .cities
            .iter()
            .find(|city| haystack.contains(&city.to_lowercase()));
        let alias_hit = city_hit.is_none()
            && tier
                .aliases
                .iter()
                .any(|alias| haystack.contains(&alias.to_lowercase()));

        if city_hit.is_none() && !alias_hit {
            continue;
        }

        // Remote tiers carry no province and therefore no concrete city
        let city = if tier.province.is_some() {
            city_hit.cloned().or_else(|| tier.cities.first().cloned())
        } else {
            None
        };

        return Some(LocationMatch {
            tier: key.clone(),
            points: tier.points,
            city,
            province: tier.province.clone(),
            country: tier.country.clone(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        BandThreshold, BandsConfig, CompaniesConfig, FreshnessBracket, FreshnessConfig,
        LocationTier, LocationsConfig, ModesConfig, ScoreWeights, ScoringConfig, SourcesConfig,
        TitleFilters,
    };

    fn rules() -> RulesConfig {
        let mut locations = LocationsConfig::new();
        locations.insert(
            "L1",
            LocationTier {
                label: "Toronto core".into(),
                points: 40,
                cities: vec!["Toronto".into(), "North York".into()],
                aliases: vec!["GTA".into(), "6ix".into()],
                province: Some("Ontario".into()),
                country: Some("Canada".into()),
            },
        );
        locations.insert(
            "L3",
            LocationTier {
                label: "BC hubs".into(),
                points: 20,
                cities: vec!["Vancouver".into()],
                aliases: vec![],
                province: Some("British Columbia".into()),
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

        RulesConfig {
            locations,
            titles: TitleFilters::default(),
            modes: ModesConfig::new(),
            scoring: ScoringConfig {
                freshness: FreshnessConfig {
                    brackets: vec![FreshnessBracket { max_hours: None, points: 0 }],
                    low_confidence_cap: 50,
                },
                bands: BandsConfig {
                    top_priority: BandThreshold { min_score: 80 },
                    good_match: BandThreshold { min_score: 60 },
                    worth_a_look: BandThreshold { min_score: 0 },
                },
                weights: ScoreWeights::default(),
            },
            sources: SourcesConfig::new(),
            companies: CompaniesConfig::new(),
        }
    }

    #[test]
    fn test_city_match_yields_province() {
        let m = match_location("Toronto, ON", &rules()).unwrap();
        assert_eq!(m.tier, "L1");
        assert_eq!(m.city.as_deref(), Some("Toronto"));
        assert_eq!(m.province.as_deref(), Some("Ontario"));
        assert_eq!(m.country.as_deref(), Some("Canada"));
    }

    #[test]
    fn test_alias_match_falls_back_to_first_city() {
        let m = match_location("Anywhere in the GTA", &rules()).unwrap();
        assert_eq!(m.tier, "L1");
        assert_eq!(m.city.as_deref(), Some("Toronto"));
    }

    #[test]
    fn test_bc_tier() {
        let m = match_location("Vancouver, BC", &rules()).unwrap();
        assert_eq!(m.tier, "L3");
        assert_eq!(m.province.as_deref(), Some("British Columbia"));
    }

    #[test]
    fn test_remote_tier_has_no_city_or_province() {
        let m = match_location("Remote - Canada", &rules()).unwrap();
        assert_eq!(m.tier, "L5");
        assert_eq!(m.city, None);
        assert_eq!(m.province, None);
    }

    #[test]
    fn test_highest_points_wins() {
        // Matches both L1 (40) and L5 alias; L1 wins
        let m = match_location("Toronto (remote - canada ok)", &rules()).unwrap();
        assert_eq!(m.tier, "L1");
    }

    #[test]
    fn test_no_match() {
        assert_eq!(match_location("Berlin, Germany", &rules()), None);
        assert_eq!(match_location("", &rules()), None);
    }
}
