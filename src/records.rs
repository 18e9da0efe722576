//! Core data records shared by the scanner, the inference stages and the
//! output writers.

use crate::constants::{UNCERTAINTY_THRESHOLD, detector_class};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Axis-aligned box in source-image pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width, never negative.
    pub width: i32,
    /// Height, never negative.
    pub height: i32,
}

impl BoundingBox {
    /// Build a box from `[x1, y1, x2, y2]` corner coordinates.
    ///
    /// Coordinates are truncated toward zero. Inverted corners produce a
    /// zero-sized box rather than a negative extent.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_corners(corners: [f32; 4]) -> Self {
        let [x1, y1, x2, y2] = corners.map(|v| if v.is_finite() { v as i32 } else { 0 });
        Self {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0),
            height: (y2 - y1).max(0),
        }
    }

    /// Box area in square pixels.
    #[allow(clippy::cast_sign_loss)]
    pub fn area(&self) -> u64 {
        u64::from(self.width.max(0) as u32) * u64::from(self.height.max(0) as u32)
    }
}

/// Coarse category reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionCategory {
    /// Empty frame.
    Background,
    /// Animal.
    Animal,
    /// Person.
    Person,
    /// Vehicle.
    Vehicle,
    /// Any id outside the known set.
    Other(i64),
}

impl From<i64> for DetectionCategory {
    fn from(class_id: i64) -> Self {
        match class_id {
            detector_class::BACKGROUND => Self::Background,
            detector_class::ANIMAL => Self::Animal,
            detector_class::PERSON => Self::Person,
            detector_class::VEHICLE => Self::Vehicle,
            other => Self::Other(other),
        }
    }
}

/// A raw candidate region produced by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    /// Stable id, used to pair the box with its classification.
    pub id: usize,
    /// `[x1, y1, x2, y2]` in pixel space.
    pub bbox: [f32; 4],
    /// Detector confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Detector class id.
    pub class_id: i64,
}

impl DetectionBox {
    /// Detector category of this box.
    pub fn category(&self) -> DetectionCategory {
        DetectionCategory::from(self.class_id)
    }
}

/// One entry of a classifier distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfidence {
    /// Species label.
    pub species: String,
    /// Confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl ClassificationConfidence {
    /// Create a new entry.
    pub fn new(species: impl Into<String>, confidence: f32) -> Self {
        Self {
            species: species.into(),
            confidence,
        }
    }
}

/// Classifier output for a single cropped detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Id of the [`DetectionBox`] this crop was taken from.
    pub detection_id: usize,
    /// Top label.
    pub prediction: String,
    /// Classifier class id of the top label.
    pub class_id: i64,
    /// Confidence of the top label.
    pub confidence: f32,
    /// Distribution over labels, in no guaranteed order.
    pub all_confidences: Vec<ClassificationConfidence>,
}

impl ClassificationResult {
    /// Distribution sorted by confidence, highest first.
    pub fn ranked(&self) -> Vec<ClassificationConfidence> {
        let mut ranked = self.all_confidences.clone();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked
    }
}

/// Contextual signals recorded when species enhancement changed a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementMetadata {
    /// Label before enhancement.
    pub original_classification: String,
    /// Which resolution step produced the label.
    pub classification_method: String,
    /// Size bucket of the detection.
    pub size_category: String,
    /// Habitat inferred from the whole frame.
    pub habitat_category: String,
    /// Activity period inferred from the capture time.
    pub temporal_category: String,
    /// Bounding box area divided by image area.
    pub area_ratio: f64,
}

/// Final per-animal output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalDetection {
    /// Species label.
    pub species: String,
    /// Confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Location in the source image.
    pub bounding_box: BoundingBox,
    /// Model or method that produced the label.
    pub classification_model: String,
    /// Whether the label should be reviewed.
    pub is_uncertain: bool,
    /// Up to two other plausible species.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_species: Option<Vec<String>>,
    /// Signals used when enhancement fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement_metadata: Option<EnhancementMetadata>,
}

impl AnimalDetection {
    /// Create a detection; uncertainty is derived from the confidence.
    pub fn new(
        species: impl Into<String>,
        confidence: f32,
        bounding_box: BoundingBox,
        classification_model: impl Into<String>,
    ) -> Self {
        Self {
            species: species.into(),
            confidence,
            bounding_box,
            classification_model: classification_model.into(),
            is_uncertain: confidence < UNCERTAINTY_THRESHOLD,
            alternative_species: None,
            enhancement_metadata: None,
        }
    }

    /// Override the derived uncertainty flag.
    #[must_use]
    pub fn with_uncertainty(mut self, is_uncertain: bool) -> Self {
        self.is_uncertain = is_uncertain;
        self
    }
}

/// Which stage of the fallback chain produced a capture timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Parsed from a directory name in a nested layout.
    DirectoryName,
    /// Parsed from the filename token pattern.
    Filename,
    /// Read from EXIF capture time.
    Exif,
    /// File modification time.
    FileModified,
    /// Nothing usable, or rejected by the sanity check; current time.
    Fallback,
}

impl TimestampSource {
    /// Stable lowercase name, as used in JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectoryName => "directory_name",
            Self::Filename => "filename",
            Self::Exif => "exif",
            Self::FileModified => "file_modified",
            Self::Fallback => "fallback",
        }
    }
}

/// Capture metadata of one scanned image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Path to the image file.
    pub file_path: PathBuf,
    /// Camera site or location name.
    pub location: String,
    /// Capture time (local, naive).
    pub timestamp: NaiveDateTime,
    /// Identifier of the capturing camera.
    pub camera_reference: String,
    /// How `timestamp` was resolved.
    pub timestamp_source: TimestampSource,
}

/// Detections for one processed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Path to the image file.
    pub image_path: PathBuf,
    /// Identifier of the capturing camera.
    pub camera_reference: String,
    /// Capture time.
    pub timestamp: NaiveDateTime,
    /// Animals found, in detector order.
    pub detections: Vec<AnimalDetection>,
    /// Classifier model version.
    pub model_version: String,
}

/// Models used for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Detector backend name.
    pub detector: String,
    /// Classifier backend name.
    pub classifier: String,
    /// Classifier model version.
    pub model_version: String,
}

/// Batch-level bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Images accepted by the scanner.
    pub total_images: usize,
    /// Images processed without error.
    pub successful_detections: usize,
    /// Animals found across all images.
    pub total_animals: usize,
    /// Images that failed scanning or processing.
    pub failed_images: Vec<PathBuf>,
    /// Files skipped because of their extension.
    pub skipped_files: usize,
    /// Wall-clock duration of the batch in seconds.
    pub processing_duration: f64,
    /// Models used.
    pub model_info: ModelInfo,
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResults {
    /// Counts, failures and timing.
    pub processing_metadata: ProcessingMetadata,
    /// Per-image results grouped by camera reference.
    pub results_by_camera: BTreeMap<String, Vec<DetectionResult>>,
}

impl ProcessingResults {
    /// Iterate every per-image result across cameras.
    pub fn iter_results(&self) -> impl Iterator<Item = &DetectionResult> {
        self.results_by_camera.values().flatten()
    }
}
