//! ONNX animal detector (YOLO-style `MegaDetector` exports).
//!
//! Expects a single output of shape `[1, N, 5 + C]` with rows of
//! `cx, cy, w, h, objectness, class scores...` in model input pixels.
//! Class index `k` is reported as detector class id `k + 1` so that index 0
//! (animal) maps to class id 1.

use crate::config::InferenceDevice;
use crate::constants::onnx::{DETECTOR_INPUT_SIZE, MIN_CANDIDATE_SCORE, NMS_IOU_THRESHOLD};
use crate::error::{Error, Result};
use crate::inference::{AnimalDetector, LazySession, RawDetections};
use image::RgbImage;
use image::imageops::{FilterType, resize};
use ort::value::Tensor;
use std::path::PathBuf;
use tracing::debug;

/// Detector backed by an ONNX model file.
pub struct OnnxDetector {
    name: String,
    session: LazySession,
    input_size: u32,
}

impl OnnxDetector {
    /// Create a detector; the model is loaded on first use.
    pub fn new(model_path: impl Into<PathBuf>, device: InferenceDevice) -> Self {
        let model_path = model_path.into();
        let name = model_path.file_stem().map_or_else(
            || "onnx-detector".to_string(),
            |s| s.to_string_lossy().to_string(),
        );
        Self {
            name,
            session: LazySession::new(model_path, device),
            input_size: DETECTOR_INPUT_SIZE,
        }
    }
}

impl AnimalDetector for OnnxDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn ensure_ready(&self) -> Result<()> {
        self.session.ensure_loaded()
    }

    #[allow(clippy::cast_precision_loss)]
    fn detect(&self, image: &RgbImage) -> Result<RawDetections> {
        let size = self.input_size;
        let input = image_to_chw(&resize(image, size, size, FilterType::Triangle), None);
        let tensor = Tensor::from_array(([1usize, 3, size as usize, size as usize], input))
            .map_err(|e| Error::Inference {
                reason: e.to_string(),
            })?;

        let (dims, data) = self.session.with_session(|session| {
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| Error::Inference {
                    reason: e.to_string(),
                })?;
            let (shape, data) =
                outputs[0]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| Error::Inference {
                        reason: e.to_string(),
                    })?;
            Ok((shape.iter().copied().collect::<Vec<i64>>(), data.to_vec()))
        })?;

        let candidates = decode_yolo(&dims, &data)?;
        let kept = non_max_suppression(candidates, NMS_IOU_THRESHOLD);
        debug!("Detector kept {} boxes after NMS", kept.len());

        let sx = image.width() as f32 / size as f32;
        let sy = image.height() as f32 / size as f32;
        let mut raw = RawDetections::default();
        for c in kept {
            raw.boxes.push(c.bbox);
            raw.confidences.push(c.score);
            raw.class_ids.push(c.class_id);
        }
        Ok(raw.scaled(sx, sy))
    }
}

/// Convert an RGB image to a planar `CHW` float buffer.
///
/// Values are scaled to `0..1`; when `norm` is given each channel is then
/// standardised with `(mean, std)`.
pub(crate) fn image_to_chw(image: &RgbImage, norm: Option<([f32; 3], [f32; 3])>) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let plane = (w * h) as usize;
    let mut data = vec![0.0_f32; plane * 3];
    for (i, pixel) in image.pixels().enumerate() {
        for c in 0..3 {
            let mut v = f32::from(pixel[c]) / 255.0;
            if let Some((mean, std)) = norm {
                v = (v - mean[c]) / std[c];
            }
            data[c * plane + i] = v;
        }
    }
    data
}

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    bbox: [f32; 4],
    score: f32,
    class_id: i64,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn decode_yolo(dims: &[i64], data: &[f32]) -> Result<Vec<Candidate>> {
    let (rows, cols) = match dims {
        [1, rows, cols] | [rows, cols] => (*rows as usize, *cols as usize),
        _ => {
            return Err(Error::MalformedPayload {
                message: format!("unexpected detector output shape {dims:?}"),
            });
        }
    };
    if cols < 6 || data.len() < rows * cols {
        return Err(Error::MalformedPayload {
            message: format!("detector output too small for shape {dims:?}"),
        });
    }

    let mut candidates = Vec::new();
    for row in data.chunks_exact(cols).take(rows) {
        let objectness = row[4];
        if objectness < MIN_CANDIDATE_SCORE {
            continue;
        }
        let Some((class_idx, class_score)) = row[5..]
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            continue;
        };
        let score = objectness * class_score;
        if score < MIN_CANDIDATE_SCORE {
            continue;
        }
        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        candidates.push(Candidate {
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            score,
            class_id: class_idx as i64 + 1,
        });
    }
    Ok(candidates)
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Greedy per-class NMS, highest score first.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
