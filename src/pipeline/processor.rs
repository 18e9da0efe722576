//! Batch processing pipeline.

use crate::combiner::{Combined, combine_with_sources};
use crate::config::ProcessingConfig;
use crate::constants::{
    DEFAULT_DETECTION_THRESHOLD, DEFAULT_IMAGE_TIMEOUT_SECS, DEFAULT_MAX_IMAGE_DIMENSION,
    DEFAULT_MIN_CONFIDENCE,
};
use crate::enhance::{EnhanceInput, EnhancedClassification, SpeciesEnhancer};
use crate::error::{Error, Result};
use crate::inference::{
    AnimalDetector, SpeciesClassifier, normalize_classification, normalize_detections,
};
use crate::metadata::MetadataScanner;
use crate::output::progress;
use crate::records::{
    AnimalDetection, DetectionBox, DetectionCategory, DetectionResult, ImageMetadata, ModelInfo,
    ProcessingMetadata, ProcessingResults, TimestampSource,
};
use image::RgbImage;
use image::imageops::{self, FilterType};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Thresholds and limits applied to each image.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorSettings {
    /// Minimum classification confidence kept.
    pub min_confidence: f32,
    /// Minimum detector confidence for a box to be classified.
    pub detection_threshold: f32,
    /// Per-image time limit, checked after the image is done.
    pub image_timeout: Duration,
    /// Longest image side handed to the detector.
    pub max_image_dimension: u32,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            image_timeout: Duration::from_secs(DEFAULT_IMAGE_TIMEOUT_SECS),
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
        }
    }
}

impl From<&ProcessingConfig> for ProcessorSettings {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            detection_threshold: config.detection_threshold,
            image_timeout: Duration::from_secs(config.image_timeout_secs),
            max_image_dimension: config.max_image_dimension,
        }
    }
}

/// Runs detection, classification and enhancement over an image tree.
pub struct Processor {
    detector: Box<dyn AnimalDetector>,
    classifier: Box<dyn SpeciesClassifier>,
    enhancer: Option<SpeciesEnhancer>,
    scanner: MetadataScanner,
    settings: ProcessorSettings,
}

impl Processor {
    /// Create a processor without species enhancement.
    pub fn new(
        detector: Box<dyn AnimalDetector>,
        classifier: Box<dyn SpeciesClassifier>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            detector,
            classifier,
            enhancer: None,
            scanner: MetadataScanner::new(),
            settings,
        }
    }

    /// Enable species enhancement.
    #[must_use]
    pub fn with_enhancer(mut self, enhancer: SpeciesEnhancer) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    /// Replace the metadata scanner.
    #[must_use]
    pub fn with_scanner(mut self, scanner: MetadataScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Process every image under `root`.
    ///
    /// Only a missing root or a model that cannot be loaded fails the batch;
    /// per-image problems end up in `failed_images`.
    pub fn process_directory(
        &mut self,
        root: &Path,
        show_progress: bool,
    ) -> Result<ProcessingResults> {
        let start_time = Instant::now();

        self.detector.ensure_ready()?;
        self.classifier.ensure_ready()?;

        let root_name = root.display().to_string();
        let spinner = progress::create_scan_spinner(&root_name, show_progress);
        let report = self.scanner.scan(root);
        progress::finish_progress(spinner, "scan complete");
        let report = report?;

        info!(
            "Processing {} images from {} ({} failed validation, {} skipped)",
            report.images.len(),
            root.display(),
            report.failed.len(),
            report.skipped.len()
        );

        let mut failed_images: Vec<PathBuf> =
            report.failed.iter().map(|f| f.path.clone()).collect();
        let mut results_by_camera: BTreeMap<String, Vec<DetectionResult>> = BTreeMap::new();
        let mut successful = 0;
        let mut total_animals = 0;

        let limit = self.settings.image_timeout;
        let pb = progress::create_image_progress(report.images.len(), show_progress);
        for meta in &report.images {
            let file_name = meta
                .file_path
                .file_name()
                .map_or_else(|| root_name.clone(), |n| n.to_string_lossy().into_owned());
            progress::set_progress_message(pb.as_ref(), &file_name);

            let image_start = Instant::now();
            let outcome = self
                .process_image(meta)
                .and_then(|result| check_timeout(image_start.elapsed(), limit).map(|()| result));

            match outcome {
                Ok(result) => {
                    successful += 1;
                    total_animals += result.detections.len();
                    results_by_camera
                        .entry(result.camera_reference.clone())
                        .or_default()
                        .push(result);
                }
                Err(e @ Error::ProcessingTimeout { .. }) => {
                    warn!("Discarding {}: {}", meta.file_path.display(), e);
                    failed_images.push(meta.file_path.clone());
                }
                Err(e) => {
                    error!("Failed to process {}: {}", meta.file_path.display(), e);
                    failed_images.push(meta.file_path.clone());
                }
            }
            progress::inc_progress(pb.as_ref());
        }
        progress::finish_progress(pb, "done");

        let processing_duration = start_time.elapsed().as_secs_f64();
        info!(
            "Processed {}/{} images in {:.2}s, {} animals",
            successful,
            report.images.len(),
            processing_duration,
            total_animals
        );

        Ok(ProcessingResults {
            processing_metadata: ProcessingMetadata {
                total_images: report.images.len(),
                successful_detections: successful,
                total_animals,
                failed_images,
                skipped_files: report.skipped.len(),
                processing_duration,
                model_info: self.model_info(),
            },
            results_by_camera,
        })
    }

    /// Detect, classify and enhance the animals in one scanned image.
    pub fn process_image(&mut self, meta: &ImageMetadata) -> Result<DetectionResult> {
        let path = &meta.file_path;
        let image = image::open(path)
            .map_err(|source| Error::ImageOpen {
                path: path.clone(),
                source,
            })?
            .to_rgb8();

        let candidates = self.detect_animals(&image)?;
        debug!(
            "{}: {} animal boxes at or above {:.2}",
            path.display(),
            candidates.len(),
            self.settings.detection_threshold
        );

        let mut classifications = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let Some(crop) = crop_box(&image, candidate.bbox) else {
                debug!("Skipping empty crop for detection {}", candidate.id);
                continue;
            };
            let raw = self.classifier.classify(&crop)?;
            classifications.push(normalize_classification(candidate.id, raw));
        }

        let model_version = self.classifier.model_version().to_string();
        let timestamp = capture_time_hint(meta);
        let combined = combine_with_sources(
            &candidates,
            &classifications,
            &model_version,
            self.settings.min_confidence,
        );

        let detections = combined
            .into_iter()
            .map(|c| self.enhance_detection(c, &image, timestamp.as_deref(), &model_version))
            .collect::<Vec<_>>();

        debug!("{}: {} animals", path.display(), detections.len());

        Ok(DetectionResult {
            image_path: path.clone(),
            camera_reference: meta.camera_reference.clone(),
            timestamp: meta.timestamp,
            detections,
            model_version,
        })
    }

    fn detect_animals(&self, image: &RgbImage) -> Result<Vec<DetectionBox>> {
        let (frame, sx, sy) = detection_frame(image, self.settings.max_image_dimension);
        let raw = self.detector.detect(&frame)?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let raw = if matches!(frame, Cow::Owned(_)) {
            raw.scaled(sx, sy)
        } else {
            raw
        };

        Ok(normalize_detections(raw)?
            .into_iter()
            .filter(|b| {
                b.category() == DetectionCategory::Animal
                    && b.confidence >= self.settings.detection_threshold
            })
            .collect())
    }

    fn enhance_detection(
        &mut self,
        combined: Combined<'_>,
        image: &RgbImage,
        timestamp: Option<&str>,
        model_version: &str,
    ) -> AnimalDetection {
        let Combined {
            detection,
            classification,
        } = combined;

        let Some(enhancer) = self.enhancer.as_mut() else {
            return detection;
        };
        if !enhancer.needs_enhancement(&detection.species) {
            return detection;
        }

        let input = EnhanceInput {
            bbox: detection.bounding_box,
            confidence: detection.confidence,
        };
        let enhanced = enhancer.enhance(&input, classification, image, timestamp);
        if enhanced.is_enhanced() {
            apply_enhancement(detection, enhanced, model_version)
        } else {
            detection
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            detector: self.detector.name().to_string(),
            classifier: self.classifier.name().to_string(),
            model_version: self.classifier.model_version().to_string(),
        }
    }
}

/// Capture time handed to the enhancer; `None` when the image is undated.
fn capture_time_hint(meta: &ImageMetadata) -> Option<String> {
    (meta.timestamp_source != TimestampSource::Fallback)
        .then(|| meta.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Replace the label of a detection with an enhanced one.
fn apply_enhancement(
    detection: AnimalDetection,
    enhanced: EnhancedClassification,
    model_version: &str,
) -> AnimalDetection {
    let mut updated = AnimalDetection::new(
        enhanced.species,
        enhanced.confidence,
        detection.bounding_box,
        format!("{model_version}:{}", enhanced.method),
    );
    if !enhanced.alternative_species.is_empty() {
        updated.alternative_species = Some(enhanced.alternative_species);
    }
    updated.enhancement_metadata = enhanced.metadata;
    updated
}

/// Frame handed to the detector, with the factors mapping its pixel space
/// back to the source image.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn detection_frame(image: &RgbImage, max_dimension: u32) -> (Cow<'_, RgbImage>, f32, f32) {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension || max_dimension == 0 {
        return (Cow::Borrowed(image), 1.0, 1.0);
    }

    let scale = f64::from(max_dimension) / f64::from(longest);
    let new_width = ((f64::from(width) * scale).round() as u32).max(1);
    let new_height = ((f64::from(height) * scale).round() as u32).max(1);
    let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);

    (
        Cow::Owned(resized),
        width as f32 / new_width as f32,
        height as f32 / new_height as f32,
    )
}

/// Crop a `[x1, y1, x2, y2]` box, clamped to the image. `None` when empty.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn crop_box(image: &RgbImage, bbox: [f32; 4]) -> Option<RgbImage> {
    let (width, height) = image.dimensions();
    let clamp = |v: f32, max: u32| -> u32 {
        if v.is_finite() {
            v.max(0.0).min(max as f32) as u32
        } else {
            0
        }
    };

    let x1 = clamp(bbox[0], width);
    let y1 = clamp(bbox[1], height);
    let x2 = clamp(bbox[2], width);
    let y2 = clamp(bbox[3], height);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image())
}

/// Fail when an image took longer than `limit`.
fn check_timeout(elapsed: Duration, limit: Duration) -> Result<()> {
    if elapsed > limit {
        return Err(Error::ProcessingTimeout {
            elapsed_secs: elapsed.as_secs_f64(),
            limit_secs: limit.as_secs_f64(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_detection_frame_keeps_small_images() {
        let image = RgbImage::new(640, 480);
        let (frame, sx, sy) = detection_frame(&image, 1920);
        assert!(matches!(frame, Cow::Borrowed(_)));
        assert_eq!((sx, sy), (1.0, 1.0));
    }

    #[test]
    fn test_detection_frame_downscales_longest_side() {
        let image = RgbImage::new(400, 200);
        let (frame, sx, sy) = detection_frame(&image, 100);
        assert_eq!(frame.dimensions(), (100, 50));
        assert_eq!((sx, sy), (4.0, 4.0));
    }

    #[test]
    fn test_crop_box_clamps_to_image() {
        let mut image = RgbImage::new(100, 80);
        image.put_pixel(99, 79, Rgb([255, 0, 0]));
        let crop = crop_box(&image, [50.0, 40.0, 500.0, 500.0]).unwrap();
        assert_eq!(crop.dimensions(), (50, 40));
        assert_eq!(crop.get_pixel(49, 39), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_crop_box_rejects_empty_regions() {
        let image = RgbImage::new(100, 80);
        assert!(crop_box(&image, [10.0, 10.0, 10.0, 50.0]).is_none());
        assert!(crop_box(&image, [200.0, 10.0, 300.0, 50.0]).is_none());
        assert!(crop_box(&image, [f32::NAN, 0.0, 10.0, 10.0]).is_some());
    }

    #[test]
    fn test_check_timeout() {
        let limit = Duration::from_secs(30);
        assert!(check_timeout(Duration::from_secs(29), limit).is_ok());
        assert!(matches!(
            check_timeout(Duration::from_secs(31), limit),
            Err(Error::ProcessingTimeout { .. })
        ));
    }

    #[test]
    fn test_capture_time_hint_skips_fallback_times() {
        let mut meta = ImageMetadata {
            file_path: "/traps/IMG_0001.jpg".into(),
            location: "traps".to_string(),
            timestamp: chrono::NaiveDate::from_ymd_opt(2025, 6, 12)
                .unwrap()
                .and_hms_opt(21, 30, 0)
                .unwrap(),
            camera_reference: "traps".to_string(),
            timestamp_source: TimestampSource::Exif,
        };
        assert_eq!(
            capture_time_hint(&meta).as_deref(),
            Some("2025-06-12T21:30:00")
        );

        meta.timestamp_source = TimestampSource::Fallback;
        assert!(capture_time_hint(&meta).is_none());
    }

    #[test]
    fn test_settings_from_config() {
        let config = ProcessingConfig {
            image_timeout_secs: 5,
            ..ProcessingConfig::default()
        };
        let settings = ProcessorSettings::from(&config);
        assert_eq!(settings.image_timeout, Duration::from_secs(5));
        assert_eq!(settings.detection_threshold, 0.25);
    }
}
