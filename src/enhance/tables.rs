//! Enhancement lookup tables.
//!
//! The built-in tables target Central European camera-trap sites. A TOML
//! file with the same shape replaces them wholesale; any section left out
//! of the file keeps its built-in value.

use crate::enhance::signals::{HabitatCategory, SizeCategory, TemporalCategory};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Complete set of enhancement tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementTables {
    /// Label tokens that mark a classification as too generic to keep.
    pub generic_terms: Vec<String>,
    /// Multiplier applied to the entry confidence on a direct keyword hit.
    pub keyword_boost: f32,
    /// Weight multiplier for species living in the inferred habitat.
    pub habitat_multiplier: f64,
    /// Weight multiplier for species active at the inferred time of day.
    pub temporal_multiplier: f64,
    /// Foreign keyword -> regional species.
    pub keywords: BTreeMap<String, String>,
    /// Foreign keyword -> size-dependent mapping.
    pub taxonomy: BTreeMap<String, TaxonomyRule>,
    /// Species pools per size category.
    pub pools: SpeciesPools,
    /// Confidence multipliers for context-weighted picks.
    pub tiers: ConfidenceTiers,
}

/// Size-dependent mapping for one foreign keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyRule {
    /// Entry confidence must exceed this for the rule to fire.
    pub threshold: f32,
    /// Multiplier applied to the entry confidence.
    pub quality: f32,
    /// Species for large boxes.
    pub large: String,
    /// Species for medium boxes.
    pub medium: String,
    /// Species for small boxes.
    pub small: String,
    /// Species for tiny boxes.
    pub tiny: String,
}

impl TaxonomyRule {
    /// Target species for a size category.
    pub fn species_for(&self, size: SizeCategory) -> &str {
        match size {
            SizeCategory::Large => &self.large,
            SizeCategory::Medium => &self.medium,
            SizeCategory::Small => &self.small,
            SizeCategory::Tiny => &self.tiny,
        }
    }
}

/// Candidate species with its prior weight and context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSpecies {
    /// Species name.
    pub name: String,
    /// Base weight before context adjustment.
    pub weight: f64,
    /// Habitats where the species is commonly recorded.
    #[serde(default)]
    pub habitats: Vec<HabitatCategory>,
    /// Main activity period.
    pub activity: TemporalCategory,
}

/// Species pools keyed by size category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesPools {
    /// Large animals.
    pub large: Vec<PoolSpecies>,
    /// Medium animals.
    pub medium: Vec<PoolSpecies>,
    /// Small animals.
    pub small: Vec<PoolSpecies>,
    /// Tiny animals.
    pub tiny: Vec<PoolSpecies>,
}

impl SpeciesPools {
    /// Pool for a size category.
    pub fn for_size(&self, size: SizeCategory) -> &[PoolSpecies] {
        match size {
            SizeCategory::Large => &self.large,
            SizeCategory::Medium => &self.medium,
            SizeCategory::Small => &self.small,
            SizeCategory::Tiny => &self.tiny,
        }
    }
}

/// Confidence multipliers selected by the winning probability mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceTiers {
    /// Probability at or above which `high` applies.
    pub high_mass: f64,
    /// Probability at or above which `medium` applies.
    pub medium_mass: f64,
    /// Multiplier for a dominant pick.
    pub high: f32,
    /// Multiplier for a plausible pick.
    pub medium: f32,
    /// Multiplier otherwise.
    pub low: f32,
}

impl Default for ConfidenceTiers {
    fn default() -> Self {
        Self {
            high_mass: 0.5,
            medium_mass: 0.3,
            high: 0.85,
            medium: 0.7,
            low: 0.55,
        }
    }
}

impl ConfidenceTiers {
    /// Multiplier for a pick with probability `mass`.
    pub fn multiplier(&self, mass: f64) -> f32 {
        if mass >= self.high_mass {
            self.high
        } else if mass >= self.medium_mass {
            self.medium
        } else {
            self.low
        }
    }
}

fn species(
    name: &str,
    weight: f64,
    habitats: &[HabitatCategory],
    activity: TemporalCategory,
) -> PoolSpecies {
    PoolSpecies {
        name: name.to_string(),
        weight,
        habitats: habitats.to_vec(),
        activity,
    }
}

fn rule(threshold: f32, quality: f32, targets: [&str; 4]) -> TaxonomyRule {
    let [large, medium, small, tiny] = targets.map(ToString::to_string);
    TaxonomyRule {
        threshold,
        quality,
        large,
        medium,
        small,
        tiny,
    }
}

impl Default for EnhancementTables {
    fn default() -> Self {
        use HabitatCategory::{Forest, Meadow, Mixed};
        use TemporalCategory::{Crepuscular, Diurnal, Nocturnal};

        let keywords = [
            ("bos", "Red Deer"),
            ("equus", "Red Deer"),
            ("procyon", "Raccoon"),
            ("sylvilagus", "European Hare"),
            ("mazama", "Roe Deer"),
            ("leopardus", "European Wildcat"),
            ("tayassu", "Wild Boar"),
            ("pecari", "Wild Boar"),
            ("nasua", "European Badger"),
            ("eira", "Pine Marten"),
            ("cerdocyon", "Red Fox"),
            ("urocyon", "Red Fox"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let taxonomy = [
            (
                "dasyprocta",
                rule(0.3, 0.8, ["Roe Deer", "European Hare", "Red Squirrel", "Red Squirrel"]),
            ),
            (
                "didelphis",
                rule(
                    0.3,
                    0.75,
                    ["European Badger", "Stone Marten", "European Hedgehog", "European Hedgehog"],
                ),
            ),
            (
                "cuniculus",
                rule(0.35, 0.8, ["Roe Deer", "European Hare", "European Hare", "Red Squirrel"]),
            ),
            (
                "dasypus",
                rule(
                    0.3,
                    0.75,
                    ["European Badger", "European Badger", "European Hedgehog", "European Hedgehog"],
                ),
            ),
            (
                "tamandua",
                rule(
                    0.4,
                    0.7,
                    ["European Badger", "European Badger", "European Hedgehog", "European Hedgehog"],
                ),
            ),
            (
                "panthera",
                rule(
                    0.4,
                    0.75,
                    ["Eurasian Lynx", "European Wildcat", "European Wildcat", "Stone Marten"],
                ),
            ),
            (
                "puma",
                rule(
                    0.4,
                    0.75,
                    ["Eurasian Lynx", "Eurasian Lynx", "European Wildcat", "European Wildcat"],
                ),
            ),
            (
                "tapirus",
                rule(0.35, 0.9, ["Wild Boar", "Wild Boar", "Wild Boar", "Wild Boar"]),
            ),
            (
                "odocoileus",
                rule(0.3, 0.85, ["Red Deer", "Roe Deer", "Roe Deer", "Roe Deer"]),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let pools = SpeciesPools {
            large: vec![
                species("Wild Boar", 0.35, &[Forest, Mixed], Nocturnal),
                species("Red Deer", 0.30, &[Forest, Mixed], Crepuscular),
                species("Roe Deer", 0.20, &[Meadow, Forest], Crepuscular),
                species("Fallow Deer", 0.15, &[Meadow, Mixed], Crepuscular),
            ],
            medium: vec![
                species("Roe Deer", 0.30, &[Meadow, Mixed, Forest], Crepuscular),
                species("Red Fox", 0.30, &[Mixed, Meadow], Nocturnal),
                species("European Badger", 0.20, &[Forest], Nocturnal),
                species("Raccoon", 0.10, &[Forest, Mixed], Nocturnal),
                species("European Hare", 0.10, &[Meadow], Crepuscular),
            ],
            small: vec![
                species("European Hare", 0.25, &[Meadow], Crepuscular),
                species("Stone Marten", 0.20, &[Mixed], Nocturnal),
                species("Pine Marten", 0.15, &[Forest], Nocturnal),
                species("European Hedgehog", 0.15, &[Meadow, Mixed], Nocturnal),
                species("Red Squirrel", 0.15, &[Forest], Diurnal),
                species("European Wildcat", 0.10, &[Forest], Crepuscular),
            ],
            tiny: vec![
                species("Red Squirrel", 0.30, &[Forest], Diurnal),
                species("Wood Mouse", 0.30, &[Forest, Meadow], Nocturnal),
                species("European Hedgehog", 0.20, &[Meadow, Mixed], Nocturnal),
                species("Least Weasel", 0.20, &[Meadow, Mixed], Diurnal),
            ],
        };

        Self {
            generic_terms: ["animal", "mammal", "creature", "unknown"]
                .map(ToString::to_string)
                .to_vec(),
            keyword_boost: 1.3,
            habitat_multiplier: 1.5,
            temporal_multiplier: 1.5,
            keywords,
            taxonomy,
            pools,
            tiers: ConfidenceTiers::default(),
        }
    }
}

impl EnhancementTables {
    /// Whether `token` is a keyword of either foreign table.
    pub fn is_foreign_keyword(&self, token: &str) -> bool {
        self.keywords.contains_key(token) || self.taxonomy.contains_key(token)
    }
}

/// Load tables from a TOML file.
pub fn load_tables(path: &Path) -> Result<EnhancementTables> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::TablesRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| Error::TablesParse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_tables_are_consistent() {
        let tables = EnhancementTables::default();
        for size in [
            SizeCategory::Large,
            SizeCategory::Medium,
            SizeCategory::Small,
            SizeCategory::Tiny,
        ] {
            let pool = tables.pools.for_size(size);
            assert!(pool.len() >= 3, "{size} pool too small");
            assert!(pool.iter().all(|s| s.weight > 0.0));
        }
        for rule in tables.taxonomy.values() {
            assert!((0.7..=0.9).contains(&rule.quality));
        }
        assert_eq!(tables.keywords["bos"], "Red Deer");
    }

    #[test]
    fn test_tiers() {
        let tiers = ConfidenceTiers::default();
        assert_eq!(tiers.multiplier(0.5), 0.85);
        assert_eq!(tiers.multiplier(0.3), 0.7);
        assert_eq!(tiers.multiplier(0.29), 0.55);
    }

    #[test]
    fn test_load_partial_tables_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
keyword_boost = 1.1

[keywords]
lepus = "European Hare"
"#
        )
        .unwrap();

        let tables = load_tables(file.path()).unwrap();
        assert_eq!(tables.keyword_boost, 1.1);
        assert_eq!(tables.keywords.len(), 1);
        assert!(tables.is_foreign_keyword("lepus"));
        assert!(!tables.is_foreign_keyword("bos"));
        assert_eq!(tables.pools, EnhancementTables::default().pools);
    }

    #[test]
    fn test_tables_round_trip_through_toml() {
        let tables = EnhancementTables::default();
        let text = toml::to_string(&tables).unwrap();
        let back: EnhancementTables = toml::from_str(&text).unwrap();
        assert_eq!(back, tables);
    }

    #[test]
    fn test_load_tables_errors() {
        let missing = load_tables(Path::new("/nonexistent/tables.toml"));
        assert!(matches!(missing, Err(Error::TablesRead { .. })));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "keyword_boost = \"high\"").unwrap();
        assert!(matches!(
            load_tables(file.path()),
            Err(Error::TablesParse { .. })
        ));
    }
}
