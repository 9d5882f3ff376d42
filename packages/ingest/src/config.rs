//! Rule configuration loaded from JSON files.
//!
//! The pipeline is driven by a directory of JSON rule files: location
//! tiers, title filters, work-mode keywords, scoring brackets and bands,
//! source definitions, and seed company lists. Files use camelCase keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{IngestError, Result};

/// One location tier: a points value plus the city names and aliases that
/// match it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationTier {
    pub label: String,
    pub points: i64,
    #[serde(default)]
    pub cities: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Province the tier's cities belong to; None marks a remote tier,
    /// which yields neither city nor province
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Location tiers keyed `L1..L5`, kept in the order the config file
/// declared them. Matching walks tiers by descending points; point ties
/// resolve to the earlier declaration.
#[derive(Debug, Clone, Default)]
pub struct LocationsConfig {
    entries: Vec<(String, LocationTier)>,
}

impl LocationsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tier, preserving first-insertion order.
    pub fn insert(&mut self, key: impl Into<String>, tier: LocationTier) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = tier,
            None => self.entries.push((key, tier)),
        }
    }

    /// Tiers in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &LocationTier)> {
        self.entries.iter().map(|(key, tier)| (key, tier))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// JSON objects lose ordering through map types; deserialize the entries
// as they appear in the document instead.
impl<'de> Deserialize<'de> for LocationsConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct OrderedTiers;

        impl<'de> serde::de::Visitor<'de> for OrderedTiers {
            type Value = LocationsConfig;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a map of tier keys to location tiers")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, tier)) = map.next_entry::<String, LocationTier>()? {
                    entries.push((key, tier));
                }
                Ok(LocationsConfig { entries })
            }
        }

        deserializer.deserialize_map(OrderedTiers)
    }
}

/// One title-filter file: a list of lowercase substrings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TitlePatterns {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// The three title filter lists.
#[derive(Debug, Clone, Default)]
pub struct TitleFilters {
    pub include: Vec<String>,
    pub maybe: Vec<String>,
    pub reject: Vec<String>,
}

/// Per-mode scoring points and detection keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeRule {
    pub points: i64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Work-mode rules keyed "onsite" | "hybrid" | "remote" | "unknown".
pub type ModesConfig = BTreeMap<String, ModeRule>;

/// One freshness bracket; `max_hours: None` is the catch-all and sorts
/// last.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessBracket {
    pub max_hours: Option<i64>,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessConfig {
    pub brackets: Vec<FreshnessBracket>,
    pub low_confidence_cap: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandThreshold {
    pub min_score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandsConfig {
    pub top_priority: BandThreshold,
    pub good_match: BandThreshold,
    pub worth_a_look: BandThreshold,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreWeights {
    pub freshness: f64,
    pub location: f64,
    pub mode: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    pub freshness: FreshnessConfig,
    pub bands: BandsConfig,
    #[serde(default)]
    pub weights: ScoreWeights,
}

/// Rate limiting knobs for a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimiting {
    pub batch_size: usize,
    pub delay_between_requests_ms: u64,
    pub batch_pause_ms: u64,
    pub requests_per_second: Option<u32>,
}

impl Default for RateLimiting {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay_between_requests_ms: 0,
            batch_pause_ms: 1_000,
            requests_per_second: None,
        }
    }
}

/// Kind of connector a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Api,
    Html,
    Search,
}

/// Selector overrides for HTML page-parser sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorMap {
    /// Selector for one job entry (anchor or container)
    pub job: String,
    /// Selector for the title inside an entry; empty = anchor text
    pub title: String,
    /// Selector for the location inside an entry
    pub location: String,
    /// Selector for the posting body inside an entry; empty = the whole
    /// entry's text
    pub description: String,
}

/// URL-shape filter for a search aggregator: accept/deny substrings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UrlShape {
    pub host: String,
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// One source definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDef {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub enabled: bool,
    #[serde(default)]
    pub schedule: Option<String>,
    /// API endpoint with `{slug}` placeholder
    #[serde(default)]
    pub endpoint_template: Option<String>,
    /// Public posting URL with `{slug}` / `{id}` placeholders
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default)]
    pub rate_limiting: RateLimiting,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Search queries, for search-type sources
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub selectors: Option<SelectorMap>,
    #[serde(default)]
    pub url_shapes: Vec<UrlShape>,
    /// Role terms that disqualify a search result (recruiter, sales, ...)
    #[serde(default)]
    pub blocked_terms: Vec<String>,
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_retries() -> u32 {
    3
}

impl SourceDef {
    /// Fail fast when a source is missing the URL template its connector
    /// family requires.
    pub fn require_endpoint_template(&self, source: &str) -> Result<&str> {
        self.endpoint_template
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IngestError::ConnectorConfig {
                source_name: source.to_string(),
                reason: "endpointTemplate is required".to_string(),
            })
    }

    /// Fail fast when an HTML source has no page URL template.
    pub fn require_url_template(&self, source: &str) -> Result<&str> {
        self.url_template
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IngestError::ConnectorConfig {
                source_name: source.to_string(),
                reason: "urlTemplate is required".to_string(),
            })
    }
}

/// Sources keyed by name.
pub type SourcesConfig = BTreeMap<String, SourceDef>;

/// Seed board slugs keyed by platform.
pub type CompaniesConfig = BTreeMap<String, Vec<String>>;

/// Everything the pipeline needs from the config directory.
#[derive(Debug, Clone)]
pub struct RulesConfig {
    pub locations: LocationsConfig,
    pub titles: TitleFilters,
    pub modes: ModesConfig,
    pub scoring: ScoringConfig,
    pub sources: SourcesConfig,
    pub companies: CompaniesConfig,
}

impl RulesConfig {
    /// Load all rule files from a config directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let locations: LocationsConfig = read_json(&dir.join("locations.json"))?;
        let include: TitlePatterns = read_json(&dir.join("titles_include.json"))?;
        let maybe: TitlePatterns = read_json(&dir.join("titles_maybe.json"))?;
        let reject: TitlePatterns = read_json(&dir.join("titles_reject.json"))?;
        let modes: ModesConfig = read_json(&dir.join("modes.json"))?;
        let scoring: ScoringConfig = read_json(&dir.join("scoring.json"))?;
        let sources: SourcesConfig = read_json(&dir.join("sources.json"))?;
        let companies: CompaniesConfig = read_json(&dir.join("companies.json"))?;

        let config = Self { locations, titles: TitleFilters {
            include: include.patterns,
            maybe: maybe.patterns,
            reject: reject.patterns,
        }, modes, scoring, sources, companies };

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks that are cheaper to hit at startup than mid-run.
    fn validate(&self) -> Result<()> {
        if self.scoring.freshness.brackets.is_empty() {
            return Err(IngestError::Config(
                "scoring.freshness.brackets must not be empty".to_string(),
            ));
        }
        for (name, source) in &self.sources {
            if !source.enabled {
                continue;
            }
            match source.source_type {
                SourceType::Api => {
                    source.require_endpoint_template(name)?;
                }
                SourceType::Html => {
                    source.require_url_template(name)?;
                }
                SourceType::Search => {
                    if source.queries.is_empty() {
                        return Err(IngestError::ConnectorConfig {
                            source_name: name.clone(),
                            reason: "search sources need at least one query".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Location tiers in matching order: descending points; the stable
    /// sort leaves point ties in declaration order.
    pub fn tiers_by_points(&self) -> Vec<(&String, &LocationTier)> {
        let mut tiers: Vec<_> = self.locations.iter().collect();
        tiers.sort_by(|a, b| b.1.points.cmp(&a.1.points));
        tiers
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| IngestError::Config(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| IngestError::Config(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(points: i64) -> LocationTier {
        LocationTier {
            label: String::new(),
            points,
            cities: vec![],
            aliases: vec![],
            province: None,
            country: None,
        }
    }

    #[test]
    fn test_tiers_sorted_by_points_then_declaration_order() {
        // L2 is declared before L1 with equal points and must stay first
        let mut locations = LocationsConfig::new();
        locations.insert("L2", tier(40));
        locations.insert("L1", tier(40));
        locations.insert("L3", tier(25));

        let config = RulesConfig {
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
        };

        let order: Vec<&str> = config.tiers_by_points().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(order, vec!["L2", "L1", "L3"]);
    }

    #[test]
    fn test_locations_deserialize_in_document_order() {
        let json = r#"{
            "LB": {"label": "second", "points": 40},
            "LA": {"label": "first", "points": 40}
        }"#;
        let locations: LocationsConfig = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = locations.iter().map(|(k, _)| k.as_str()).collect();
        // Document order survives, not alphabetical order
        assert_eq!(keys, vec!["LB", "LA"]);
    }

    #[test]
    fn test_locations_insert_replaces_in_place() {
        let mut locations = LocationsConfig::new();
        locations.insert("L1", tier(40));
        locations.insert("L2", tier(30));
        locations.insert("L1", tier(45));

        assert_eq!(locations.len(), 2);
        let (first_key, first_tier) = locations.iter().next().unwrap();
        assert_eq!(first_key, "L1");
        assert_eq!(first_tier.points, 45);
    }

    #[test]
    fn test_require_templates() {
        let source = SourceDef {
            source_type: SourceType::Api,
            enabled: true,
            schedule: None,
            endpoint_template: None,
            url_template: None,
            rate_limiting: RateLimiting::default(),
            timeout_ms: 1000,
            max_retries: 1,
            queries: vec![],
            selectors: None,
            url_shapes: vec![],
            blocked_terms: vec![],
        };
        assert!(source.require_endpoint_template("lever").is_err());

        let mut with_template = source.clone();
        with_template.endpoint_template = Some("https://api.example.com/{slug}".into());
        assert_eq!(
            with_template.require_endpoint_template("lever").unwrap(),
            "https://api.example.com/{slug}"
        );
    }
}
