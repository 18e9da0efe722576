//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "trailcam";

/// Configuration file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "TRAILCAM_CONFIG";

/// Default minimum classification confidence kept by the combiner.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.2;

/// Default minimum detector confidence for a box to be cropped and classified.
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.25;

/// Default per-image processing time limit in seconds.
///
/// Checked after an image finishes processing; see `pipeline::Processor`.
pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 30;

/// Default longest side, in pixels, of the image handed to the detector.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 1920;

/// Default number of ranked labels kept from the classifier distribution.
pub const DEFAULT_TOP_K: usize = 5;

/// Confidence below which a detection is flagged as uncertain.
pub const UNCERTAINTY_THRESHOLD: f32 = 0.5;

/// Confidence value bounds.
pub mod confidence {
    /// Minimum valid confidence value.
    pub const MIN: f32 = 0.0;
    /// Maximum valid confidence value.
    pub const MAX: f32 = 1.0;
    /// Upper bound for any confidence produced by species enhancement.
    pub const ENHANCED_CAP: f32 = 0.95;
    /// Decimal places for confidence formatting.
    pub const DECIMAL_PLACES: usize = 4;
}

/// Detector class ids.
pub mod detector_class {
    /// Background / empty frame.
    pub const BACKGROUND: i64 = 0;
    /// Animal.
    pub const ANIMAL: i64 = 1;
    /// Person.
    pub const PERSON: i64 = 2;
    /// Vehicle.
    pub const VEHICLE: i64 = 3;
}

/// Image scanning constants.
pub mod scan {
    /// Image file extensions accepted by the metadata scanner (lowercase).
    pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif"];

    /// Smallest accepted image side in pixels.
    pub const MIN_IMAGE_DIMENSION: u32 = 32;

    /// Year offset applied to two-digit years in filename tokens.
    pub const TWO_DIGIT_YEAR_BASE: i32 = 2000;

    /// Accepted distance of a timestamp into the future, in days.
    pub const MAX_FUTURE_DAYS: i64 = 1;

    /// Accepted age of a timestamp, in years.
    pub const MAX_PAST_YEARS: u32 = 10;
}

/// Size category thresholds as percentages of the image area.
pub mod size_thresholds {
    /// Bounding box share of the image at or above which an animal is `large`.
    pub const LARGE_PERCENT: u64 = 15;
    /// Share at or above which an animal is `medium`.
    pub const MEDIUM_PERCENT: u64 = 5;
    /// Share at or above which an animal is `small`; below is `tiny`.
    pub const SMALL_PERCENT: u64 = 1;
}

/// Hour-of-day boundaries for temporal categories.
pub mod daylight {
    /// First diurnal hour (inclusive).
    pub const DAY_START: u32 = 6;
    /// End of diurnal hours (exclusive).
    pub const DAY_END: u32 = 18;
    /// First nocturnal hour (inclusive).
    pub const NIGHT_START: u32 = 22;
    /// End of nocturnal hours (exclusive).
    pub const NIGHT_END: u32 = 4;
}

/// Colour statistics thresholds for habitat inference.
pub mod habitat {
    /// Sampling stride in pixels for colour statistics.
    pub const SAMPLE_STRIDE: u32 = 4;
    /// Green share of the RGB sum above which vegetation dominates.
    pub const GREEN_DOMINANT: f64 = 0.38;
    /// Green share above which the scene counts as partly vegetated.
    pub const GREEN_PRESENT: f64 = 0.35;
    /// Mean brightness (0-1) separating shaded forest from open meadow.
    pub const OPEN_BRIGHTNESS: f64 = 0.45;
}

/// ONNX model input and post-processing constants.
pub mod onnx {
    /// Square input side of the detector model.
    pub const DETECTOR_INPUT_SIZE: u32 = 640;
    /// Square input side of the classifier model.
    pub const CLASSIFIER_INPUT_SIZE: u32 = 224;
    /// IoU threshold for non-maximum suppression.
    pub const NMS_IOU_THRESHOLD: f32 = 0.45;
    /// Detector candidates below this score are discarded before NMS.
    pub const MIN_CANDIDATE_SCORE: f32 = 0.05;
    /// `ImageNet` channel means used for classifier normalisation.
    pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
    /// `ImageNet` channel standard deviations.
    pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
}

/// Output file names.
pub mod output_files {
    /// Batch JSON document.
    pub const JSON: &str = "trailcam_results.json";
    /// Flat CSV table of detections.
    pub const CSV: &str = "trailcam_detections.csv";
}

/// UTF-8 Byte Order Mark for Excel compatibility in CSV files.
pub const UTF8_BOM: &[u8; 3] = b"\xEF\xBB\xBF";
