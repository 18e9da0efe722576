//! Pairing of detector boxes with classifier results.

use crate::records::{AnimalDetection, BoundingBox, ClassificationResult, DetectionBox};
use std::collections::HashMap;
use tracing::trace;

/// A combined detection together with the classification it came from.
#[derive(Debug, Clone)]
pub struct Combined<'a> {
    /// Output record.
    pub detection: AnimalDetection,
    /// Classification paired with the detection box.
    pub classification: &'a ClassificationResult,
}

/// Combine detection boxes with their classifications.
///
/// Each box is paired with the classification carrying its id; boxes without
/// one are skipped. The classifier confidence becomes the detection
/// confidence and candidates below `min_confidence` are dropped.
pub fn combine(
    detection_boxes: &[DetectionBox],
    classifications: &[ClassificationResult],
    model_version: &str,
    min_confidence: f32,
) -> Vec<AnimalDetection> {
    combine_with_sources(detection_boxes, classifications, model_version, min_confidence)
        .into_iter()
        .map(|c| c.detection)
        .collect()
}

/// Like [`combine`], keeping a reference to each source classification.
pub fn combine_with_sources<'a>(
    detection_boxes: &[DetectionBox],
    classifications: &'a [ClassificationResult],
    model_version: &str,
    min_confidence: f32,
) -> Vec<Combined<'a>> {
    let by_id: HashMap<usize, &ClassificationResult> = classifications
        .iter()
        .map(|c| (c.detection_id, c))
        .collect();

    let mut combined = Vec::with_capacity(detection_boxes.len());
    for detection_box in detection_boxes {
        let Some(&classification) = by_id.get(&detection_box.id) else {
            trace!("No classification for detection {}", detection_box.id);
            continue;
        };

        if classification.confidence < min_confidence {
            trace!(
                "Dropping '{}' at {:.3} (below {:.3})",
                classification.prediction, classification.confidence, min_confidence
            );
            continue;
        }

        combined.push(Combined {
            detection: AnimalDetection::new(
                classification.prediction.clone(),
                classification.confidence,
                BoundingBox::from_corners(detection_box.bbox),
                model_version,
            ),
            classification,
        });
    }

    combined
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_MIN_CONFIDENCE;
    use crate::records::ClassificationConfidence;

    fn detection_box(id: usize, bbox: [f32; 4], confidence: f32) -> DetectionBox {
        DetectionBox {
            id,
            bbox,
            confidence,
            class_id: 1,
        }
    }

    fn classification(detection_id: usize, label: &str, confidence: f32) -> ClassificationResult {
        ClassificationResult {
            detection_id,
            prediction: label.to_string(),
            class_id: 0,
            confidence,
            all_confidences: vec![ClassificationConfidence::new(label, confidence)],
        }
    }

    #[test]
    fn test_combine_pairs_box_with_classification() {
        let boxes = [detection_box(0, [100.0, 150.0, 300.0, 400.0], 0.8)];
        let classes = [classification(0, "bos", 0.55)];

        let detections = combine(&boxes, &classes, "amazon-v1", DEFAULT_MIN_CONFIDENCE);

        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.species, "bos");
        assert_eq!(d.confidence, 0.55);
        assert_eq!(
            d.bounding_box,
            BoundingBox {
                x: 100,
                y: 150,
                width: 200,
                height: 250
            }
        );
        assert!(!d.is_uncertain);
        assert_eq!(d.classification_model, "amazon-v1");
    }

    #[test]
    fn test_combine_drops_low_classifier_confidence() {
        // strong detector score does not rescue a weak classification
        let boxes = [detection_box(0, [0.0, 0.0, 50.0, 50.0], 0.9)];
        let classes = [classification(0, "mazama", 0.1)];
        assert!(combine(&boxes, &classes, "v", 0.2).is_empty());
    }

    #[test]
    fn test_combine_skips_boxes_without_classification() {
        let boxes = [
            detection_box(0, [0.0, 0.0, 10.0, 10.0], 0.9),
            detection_box(1, [20.0, 20.0, 40.0, 40.0], 0.9),
        ];
        let classes = [classification(0, "Red Fox", 0.7)];
        let detections = combine(&boxes, &classes, "v", 0.2);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bounding_box.x, 0);
    }

    #[test]
    fn test_combine_uses_ids_not_positions() {
        let boxes = [
            detection_box(0, [0.0, 0.0, 10.0, 10.0], 0.9),
            detection_box(1, [20.0, 20.0, 40.0, 40.0], 0.9),
        ];
        let classes = [
            classification(1, "Roe Deer", 0.8),
            classification(0, "Red Fox", 0.4),
        ];
        let detections = combine(&boxes, &classes, "v", 0.2);
        assert_eq!(detections[0].species, "Red Fox");
        assert!(detections[0].is_uncertain);
        assert_eq!(detections[1].species, "Roe Deer");
        assert_eq!(detections[1].bounding_box.x, 20);
    }

    #[test]
    fn test_combine_confidence_bounds_hold() {
        let boxes: Vec<DetectionBox> = (0..20)
            .map(|i| detection_box(i, [0.0, 0.0, 5.0, 5.0], 0.5))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let classes: Vec<ClassificationResult> = (0..20)
            .map(|i| classification(i, "x", i as f32 / 19.0))
            .collect();
        for d in combine(&boxes, &classes, "v", 0.3) {
            assert!((0.0..=1.0).contains(&d.confidence));
            assert!(d.confidence >= 0.3);
            assert_eq!(d.is_uncertain, d.confidence < 0.5);
            assert!(d.bounding_box.width >= 0 && d.bounding_box.height >= 0);
        }
    }

    #[test]
    fn test_combine_with_sources_keeps_classification() {
        let boxes = [
            detection_box(0, [0.0, 0.0, 10.0, 10.0], 0.9),
            detection_box(1, [20.0, 20.0, 40.0, 40.0], 0.9),
        ];
        let classes = [classification(1, "bos", 0.55), classification(0, "x", 0.1)];
        let combined = combine_with_sources(&boxes, &classes, "v", 0.2);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].classification.detection_id, 1);
        assert_eq!(combined[0].detection.species, "bos");
    }
}
