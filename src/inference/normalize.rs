//! Conversion of raw capability payloads into typed records.

use crate::error::{Error, Result};
use crate::records::{ClassificationConfidence, ClassificationResult, DetectionBox};
use serde::{Deserialize, Serialize};

/// Raw detector output for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetections {
    /// `[x1, y1, x2, y2]` boxes in pixel space.
    pub boxes: Vec<[f32; 4]>,
    /// Per-box confidence.
    pub confidences: Vec<f32>,
    /// Per-box coarse class id.
    pub class_ids: Vec<i64>,
}

impl RawDetections {
    /// Number of candidate boxes.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Whether the detector found nothing.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Multiply every coordinate by the given factors.
    #[must_use]
    pub fn scaled(mut self, sx: f32, sy: f32) -> Self {
        for b in &mut self.boxes {
            b[0] *= sx;
            b[1] *= sy;
            b[2] *= sx;
            b[3] *= sy;
        }
        self
    }
}

/// A classifier label: either one string or a list of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLabel {
    /// Plain label.
    Text(String),
    /// Multi-token label, joined with spaces.
    Tokens(Vec<String>),
}

impl RawLabel {
    /// Flatten to a single string.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Tokens(tokens) => tokens
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<&str> for RawLabel {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Raw classifier output for one crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClassification {
    /// Top label.
    pub top_label: RawLabel,
    /// Confidence of the top label.
    pub top_confidence: f32,
    /// Class id of the top label.
    pub class_id: i64,
    /// Distribution over labels.
    pub all_confidences: Vec<(RawLabel, f32)>,
}

/// Clamp a model score into `[0, 1]`; NaN becomes 0.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Convert a raw detector payload into boxes with stable ids.
///
/// Ids follow payload order. The three parallel lists must agree in length.
pub fn normalize_detections(raw: RawDetections) -> Result<Vec<DetectionBox>> {
    if raw.len() != raw.confidences.len() || raw.len() != raw.class_ids.len() {
        return Err(Error::MalformedPayload {
            message: format!(
                "detector returned {} boxes, {} confidences and {} class ids",
                raw.len(),
                raw.confidences.len(),
                raw.class_ids.len()
            ),
        });
    }

    Ok(raw
        .boxes
        .into_iter()
        .zip(raw.confidences)
        .zip(raw.class_ids)
        .enumerate()
        .map(|(id, ((bbox, confidence), class_id))| DetectionBox {
            id,
            bbox,
            confidence: clamp_confidence(confidence),
            class_id,
        })
        .collect())
}

/// Convert a raw classifier payload for the crop of `detection_id`.
pub fn normalize_classification(detection_id: usize, raw: RawClassification) -> ClassificationResult {
    ClassificationResult {
        detection_id,
        prediction: raw.top_label.into_text(),
        class_id: raw.class_id,
        confidence: clamp_confidence(raw.top_confidence),
        all_confidences: raw
            .all_confidences
            .into_iter()
            .map(|(label, confidence)| {
                ClassificationConfidence::new(label.into_text(), clamp_confidence(confidence))
            })
            .collect(),
    }
}
