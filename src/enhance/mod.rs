//! Species enhancement.
//!
//! Classifiers trained on other regions often return a generic label
//! (`animal`) or a genus from their own fauna (`bos`, `mazama`). The
//! enhancer maps such labels onto a plausible regional species using, in
//! order:
//!
//! 1. a direct keyword table,
//! 2. a size-dependent taxonomy table,
//! 3. a weighted draw from a species pool adjusted for size, habitat and
//!    time of day.
//!
//! Anything that goes wrong inside enhancement leaves the original label
//! in place.

pub mod signals;
pub mod tables;

pub use signals::{HabitatCategory, SizeCategory, TemporalCategory};
pub use tables::{EnhancementTables, load_tables};

use crate::constants::confidence;
use crate::error::{Error, Result};
use crate::records::{BoundingBox, ClassificationConfidence, ClassificationResult, EnhancementMetadata};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use tables::PoolSpecies;
use tracing::{debug, warn};

/// The parts of a detection the enhancer needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceInput {
    /// Box in source-image pixels.
    pub bbox: BoundingBox,
    /// Detection confidence after combining.
    pub confidence: f32,
}

/// Which resolution step produced a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationMethod {
    /// Label left untouched.
    Original,
    /// Direct keyword table hit.
    KeywordMapping,
    /// Size-dependent taxonomy table hit for the given keyword.
    TaxonomyMapping(String),
    /// Weighted draw from the context-adjusted pool.
    ContextWeighted,
}

impl fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::KeywordMapping => write!(f, "keyword_mapping"),
            Self::TaxonomyMapping(keyword) => write!(f, "amazon_mapping_{keyword}"),
            Self::ContextWeighted => write!(f, "context_weighted"),
        }
    }
}

/// Outcome of [`SpeciesEnhancer::enhance`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedClassification {
    /// Final species label.
    pub species: String,
    /// Adjusted confidence, never above 0.95 when enhanced.
    pub confidence: f32,
    /// Step that produced `species`.
    pub method: ClassificationMethod,
    /// Label before enhancement.
    pub original_classification: String,
    /// Up to two other candidates from the same pool.
    pub alternative_species: Vec<String>,
    /// Signals used; `None` when the label was left untouched.
    pub metadata: Option<EnhancementMetadata>,
}

impl EnhancedClassification {
    fn unchanged(classification: &ClassificationResult) -> Self {
        Self {
            species: classification.prediction.clone(),
            confidence: classification.confidence,
            method: ClassificationMethod::Original,
            original_classification: classification.prediction.clone(),
            alternative_species: Vec::new(),
            metadata: None,
        }
    }

    /// Whether the label was changed.
    pub fn is_enhanced(&self) -> bool {
        self.method != ClassificationMethod::Original
    }
}

/// Maps generic and foreign labels to regional species.
pub struct SpeciesEnhancer<R = StdRng> {
    tables: EnhancementTables,
    rng: R,
}

impl SpeciesEnhancer<StdRng> {
    /// Enhancer with a reproducible random stream.
    pub fn seeded(tables: EnhancementTables, seed: u64) -> Self {
        Self::with_rng(tables, StdRng::seed_from_u64(seed))
    }

    /// Enhancer seeded from the operating system.
    pub fn from_os_rng(tables: EnhancementTables) -> Self {
        Self::with_rng(tables, StdRng::from_os_rng())
    }
}

impl<R: Rng> SpeciesEnhancer<R> {
    /// Enhancer drawing from `rng`.
    pub fn with_rng(tables: EnhancementTables, rng: R) -> Self {
        Self { tables, rng }
    }

    /// Whether `label` is generic or carries a foreign keyword.
    pub fn needs_enhancement(&self, label: &str) -> bool {
        tokens(label).any(|token| {
            self.tables.generic_terms.iter().any(|g| *g == token)
                || self.tables.is_foreign_keyword(&token)
        })
    }

    /// Enhance one classification.
    ///
    /// Labels that are neither generic nor foreign pass through unchanged,
    /// as does any classification whose enhancement fails.
    pub fn enhance(
        &mut self,
        detection: &EnhanceInput,
        classification: &ClassificationResult,
        image: &RgbImage,
        timestamp: Option<&str>,
    ) -> EnhancedClassification {
        if !self.needs_enhancement(&classification.prediction) {
            return EnhancedClassification::unchanged(classification);
        }

        match self.try_enhance(detection, classification, image, timestamp) {
            Ok(enhanced) => {
                debug!(
                    "Enhanced '{}' -> '{}' ({}, {:.3})",
                    enhanced.original_classification,
                    enhanced.species,
                    enhanced.method,
                    enhanced.confidence
                );
                enhanced
            }
            Err(e) => {
                warn!(
                    "Keeping original label '{}': {}",
                    classification.prediction, e
                );
                EnhancedClassification::unchanged(classification)
            }
        }
    }

    fn try_enhance(
        &mut self,
        detection: &EnhanceInput,
        classification: &ClassificationResult,
        image: &RgbImage,
        timestamp: Option<&str>,
    ) -> Result<EnhancedClassification> {
        if !detection.confidence.is_finite() {
            return Err(Error::Enhancement {
                reason: "detection confidence is not finite".to_string(),
            });
        }

        let (width, height) = image.dimensions();
        let empty_frame = || Error::Enhancement {
            reason: format!("image has no area ({width}x{height})"),
        };
        let size = signals::size_category(&detection.bbox, width, height).ok_or_else(empty_frame)?;
        let area_ratio = signals::area_ratio(&detection.bbox, width, height).ok_or_else(empty_frame)?;
        let habitat = signals::infer_habitat(image);
        let temporal = signals::temporal_category(timestamp);

        let probabilities = pool_probabilities(
            self.tables.pools.for_size(size),
            habitat,
            temporal,
            self.tables.habitat_multiplier,
            self.tables.temporal_multiplier,
        );

        let ranked = classification.ranked();
        let (species, confidence, method, probabilities) =
            if let Some((species, confidence)) = self.keyword_mapping(&ranked) {
                let method = ClassificationMethod::KeywordMapping;
                (species, confidence, method, probabilities.ok())
            } else if let Some((species, confidence, keyword)) = self.taxonomy_mapping(&ranked, size)
            {
                let method = ClassificationMethod::TaxonomyMapping(keyword);
                (species, confidence, method, probabilities.ok())
            } else {
                let probabilities = probabilities?;
                let (species, confidence) = self.context_weighted(&probabilities, detection.confidence);
                let method = ClassificationMethod::ContextWeighted;
                (species, confidence, method, Some(probabilities))
            };

        let alternative_species = probabilities
            .map(|p| alternatives(&p, &species))
            .unwrap_or_default();

        let metadata = EnhancementMetadata {
            original_classification: classification.prediction.clone(),
            classification_method: method.to_string(),
            size_category: size.to_string(),
            habitat_category: habitat.to_string(),
            temporal_category: temporal.to_string(),
            area_ratio,
        };

        Ok(EnhancedClassification {
            species,
            confidence: capped(confidence),
            method,
            original_classification: classification.prediction.clone(),
            alternative_species,
            metadata: Some(metadata),
        })
    }

    fn keyword_mapping(&self, ranked: &[ClassificationConfidence]) -> Option<(String, f32)> {
        ranked.iter().find_map(|entry| {
            tokens(&entry.species).find_map(|token| {
                self.tables.keywords.get(&token).map(|target| {
                    (target.clone(), entry.confidence * self.tables.keyword_boost)
                })
            })
        })
    }

    fn taxonomy_mapping(
        &self,
        ranked: &[ClassificationConfidence],
        size: SizeCategory,
    ) -> Option<(String, f32, String)> {
        ranked.iter().find_map(|entry| {
            tokens(&entry.species).find_map(|token| {
                let rule = self.tables.taxonomy.get(&token)?;
                (entry.confidence > rule.threshold).then(|| {
                    (
                        rule.species_for(size).to_string(),
                        entry.confidence * rule.quality,
                        token,
                    )
                })
            })
        })
    }

    fn context_weighted(&mut self, probabilities: &[(String, f64)], base: f32) -> (String, f32) {
        let draw: f64 = self.rng.random();
        let mut cumulative = 0.0;
        let mut winner = probabilities.len() - 1;
        for (i, (_, p)) in probabilities.iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                winner = i;
                break;
            }
        }

        let (species, mass) = &probabilities[winner];
        let multiplier = self.tables.tiers.multiplier(*mass);
        (species.clone(), base.clamp(confidence::MIN, confidence::MAX) * multiplier)
    }
}

fn tokens(label: &str) -> impl Iterator<Item = String> + '_ {
    label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn capped(value: f32) -> f32 {
    if value.is_nan() {
        return confidence::MIN;
    }
    value.clamp(confidence::MIN, confidence::ENHANCED_CAP)
}

/// Context-adjusted, normalised probabilities for a pool, in table order.
///
/// Never returns an empty list.
fn pool_probabilities(
    pool: &[PoolSpecies],
    habitat: HabitatCategory,
    temporal: TemporalCategory,
    habitat_multiplier: f64,
    temporal_multiplier: f64,
) -> Result<Vec<(String, f64)>> {
    if pool.is_empty() {
        return Err(Error::Enhancement {
            reason: "species pool is empty".to_string(),
        });
    }

    let weights: Vec<f64> = pool
        .iter()
        .map(|s| {
            let mut w = if s.weight.is_finite() { s.weight.max(0.0) } else { 0.0 };
            if habitat != HabitatCategory::Unknown && s.habitats.contains(&habitat) {
                w *= habitat_multiplier;
            }
            if temporal != TemporalCategory::Unknown && s.activity == temporal {
                w *= temporal_multiplier;
            }
            w
        })
        .collect();

    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(Error::Enhancement {
            reason: "species pool has no usable weight".to_string(),
        });
    }

    Ok(pool
        .iter()
        .zip(weights)
        .map(|(s, w)| (s.name.clone(), w / total))
        .collect())
}

/// Two most probable pool species other than `winner`.
fn alternatives(probabilities: &[(String, f64)], winner: &str) -> Vec<String> {
    let mut ranked: Vec<&(String, f64)> = probabilities.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .filter(|(name, _)| name != winner)
        .take(2)
        .map(|(name, _)| name.clone())
        .collect()
}
