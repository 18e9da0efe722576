//! Output type definitions.

use crate::records::{AnimalDetection, DetectionResult, ProcessingResults};
use chrono::NaiveDateTime;
use std::path::PathBuf;

/// Separator between alternative species in flat exports.
pub const ALTERNATIVES_SEPARATOR: &str = ";";

/// A single animal detection flattened with its image context.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRow {
    /// Identifier of the capturing camera.
    pub camera_reference: String,
    /// Path to the source image.
    pub image_path: PathBuf,
    /// Capture time.
    pub timestamp: NaiveDateTime,
    /// Species label.
    pub species: String,
    /// Confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Bounding box left edge.
    pub x: i32,
    /// Bounding box top edge.
    pub y: i32,
    /// Bounding box width.
    pub width: i32,
    /// Bounding box height.
    pub height: i32,
    /// Whether the label should be reviewed.
    pub is_uncertain: bool,
    /// Model or method that produced the label.
    pub classification_model: String,
    /// Other plausible species, possibly empty.
    pub alternative_species: Vec<String>,
    /// Label before enhancement, when enhancement fired.
    pub original_classification: Option<String>,
}

impl DetectionRow {
    /// Flatten one detection of an image result.
    pub fn new(result: &DetectionResult, detection: &AnimalDetection) -> Self {
        let bbox = detection.bounding_box;
        Self {
            camera_reference: result.camera_reference.clone(),
            image_path: result.image_path.clone(),
            timestamp: result.timestamp,
            species: detection.species.clone(),
            confidence: detection.confidence,
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
            is_uncertain: detection.is_uncertain,
            classification_model: detection.classification_model.clone(),
            alternative_species: detection.alternative_species.clone().unwrap_or_default(),
            original_classification: detection
                .enhancement_metadata
                .as_ref()
                .map(|m| m.original_classification.clone()),
        }
    }

    /// Alternatives joined for a single text cell.
    pub fn alternatives_text(&self) -> String {
        self.alternative_species.join(ALTERNATIVES_SEPARATOR)
    }

    /// Every detection of a batch, cameras in order, images in scan order.
    pub fn from_results(results: &ProcessingResults) -> Vec<Self> {
        results
            .iter_results()
            .flat_map(|result| result.detections.iter().map(move |d| Self::new(result, d)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{BoundingBox, EnhancementMetadata};
    use chrono::NaiveDate;

    fn sample_result(detections: Vec<AnimalDetection>) -> DetectionResult {
        DetectionResult {
            image_path: PathBuf::from("/traps/BYWP9/Aufnahme_250610_0727_BYWP9.jpg"),
            camera_reference: "BYWP9".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2025, 6, 10)
                .and_then(|d| d.and_hms_opt(7, 27, 0))
                .unwrap_or_default(),
            detections,
            model_version: "v1".to_string(),
        }
    }

    #[test]
    fn test_row_copies_image_context() {
        let detection = AnimalDetection::new(
            "Roe Deer",
            0.81,
            BoundingBox::from_corners([10.0, 20.0, 110.0, 220.0]),
            "v1",
        );
        let result = sample_result(vec![detection.clone()]);
        let row = DetectionRow::new(&result, &detection);

        assert_eq!(row.camera_reference, "BYWP9");
        assert_eq!(row.species, "Roe Deer");
        assert_eq!((row.x, row.y, row.width, row.height), (10, 20, 100, 200));
        assert!(row.alternatives_text().is_empty());
        assert!(row.original_classification.is_none());
    }

    #[test]
    fn test_row_carries_enhancement_fields() {
        let mut detection = AnimalDetection::new("Red Deer", 0.715, BoundingBox::default(), "v1");
        detection.alternative_species = Some(vec!["Roe Deer".to_string(), "Wild Boar".to_string()]);
        detection.enhancement_metadata = Some(EnhancementMetadata {
            original_classification: "bos".to_string(),
            classification_method: "keyword_mapping".to_string(),
            size_category: "large".to_string(),
            habitat_category: "forest".to_string(),
            temporal_category: "crepuscular".to_string(),
            area_ratio: 0.2,
        });
        let result = sample_result(vec![detection.clone()]);
        let row = DetectionRow::new(&result, &detection);

        assert_eq!(row.alternatives_text(), "Roe Deer;Wild Boar");
        assert_eq!(row.original_classification.as_deref(), Some("bos"));
    }

    #[test]
    fn test_from_results_flattens_all_cameras() {
        let mut results = ProcessingResults::default();
        let d = AnimalDetection::new("Red Fox", 0.9, BoundingBox::default(), "v1");
        results
            .results_by_camera
            .insert("A".to_string(), vec![sample_result(vec![d.clone(), d.clone()])]);
        results
            .results_by_camera
            .insert("B".to_string(), vec![sample_result(vec![d])]);

        assert_eq!(DetectionRow::from_results(&results).len(), 3);
    }
}
