//! ONNX species classifier for detection crops.

use crate::config::InferenceDevice;
use crate::constants::onnx::{CLASSIFIER_INPUT_SIZE, IMAGENET_MEAN, IMAGENET_STD};
use crate::error::{Error, Result};
use crate::inference::detector::image_to_chw;
use crate::inference::{LazySession, RawClassification, RawLabel, SpeciesClassifier};
use image::RgbImage;
use image::imageops::{FilterType, resize};
use ort::value::Tensor;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Classifier backed by an ONNX model file and a labels file.
pub struct OnnxClassifier {
    name: String,
    model_version: String,
    session: LazySession,
    labels: Vec<String>,
    top_k: usize,
}

impl OnnxClassifier {
    /// Create a classifier. Labels are read now; the model loads on first use.
    pub fn new(
        model_path: impl Into<PathBuf>,
        labels_path: &Path,
        model_version: impl Into<String>,
        device: InferenceDevice,
        top_k: usize,
    ) -> Result<Self> {
        let model_path = model_path.into();
        let name = model_path.file_stem().map_or_else(
            || "onnx-classifier".to_string(),
            |s| s.to_string_lossy().to_string(),
        );
        Ok(Self {
            name,
            model_version: model_version.into(),
            session: LazySession::new(model_path, device),
            labels: read_labels(labels_path)?,
            top_k: top_k.max(1),
        })
    }

    /// Number of labels the classifier knows.
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

impl SpeciesClassifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn ensure_ready(&self) -> Result<()> {
        self.session.ensure_loaded()
    }

    fn classify(&self, crop: &RgbImage) -> Result<RawClassification> {
        let size = CLASSIFIER_INPUT_SIZE;
        let input = image_to_chw(
            &resize(crop, size, size, FilterType::Triangle),
            Some((IMAGENET_MEAN, IMAGENET_STD)),
        );
        let tensor = Tensor::from_array(([1usize, 3, size as usize, size as usize], input))
            .map_err(|e| Error::Inference {
                reason: e.to_string(),
            })?;

        let logits = self.session.with_session(|session| {
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| Error::Inference {
                    reason: e.to_string(),
                })?;
            let (_, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Inference {
                    reason: e.to_string(),
                })?;
            Ok(data.to_vec())
        })?;

        if logits.len() != self.labels.len() {
            return Err(Error::MalformedPayload {
                message: format!(
                    "classifier returned {} scores for {} labels",
                    logits.len(),
                    self.labels.len()
                ),
            });
        }

        Ok(top_k_distribution(&softmax(&logits), &self.labels, self.top_k))
    }
}

/// Numerically stable softmax.
pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|v| v / sum).collect()
}

/// Build a classification payload from the `top_k` most probable labels.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn top_k_distribution(
    probabilities: &[f32],
    labels: &[String],
    top_k: usize,
) -> RawClassification {
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
    order.truncate(top_k);

    let all_confidences: Vec<(RawLabel, f32)> = order
        .iter()
        .map(|&i| (RawLabel::Text(labels[i].clone()), probabilities[i]))
        .collect();

    let (top_label, top_confidence, class_id) = order.first().map_or_else(
        || (RawLabel::from("unknown"), 0.0, -1),
        |&i| (RawLabel::Text(labels[i].clone()), probabilities[i], i as i64),
    );

    RawClassification {
        top_label,
        top_confidence,
        class_id,
        all_confidences,
    }
}

/// Read a labels file: one label per line, blank lines ignored.
pub fn read_labels(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(Error::LabelsFileNotFound {
            path: path.to_path_buf(),
        });
    }

    let reader = BufReader::new(File::open(path)?);
    let mut labels = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            labels.push(trimmed.to_string());
        }
    }
    Ok(labels)
}
