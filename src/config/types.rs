//! Configuration type definitions.

use crate::constants::{
    DEFAULT_DETECTION_THRESHOLD, DEFAULT_IMAGE_TIMEOUT_SECS, DEFAULT_MAX_IMAGE_DIMENSION,
    DEFAULT_MIN_CONFIDENCE, DEFAULT_TOP_K,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model files.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Per-image processing settings.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Inference settings.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Species enhancement settings.
    #[serde(default)]
    pub enhancement: EnhancementConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Detector and classifier model files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Path to the ONNX animal detector.
    pub detector: Option<PathBuf>,

    /// Path to the ONNX species classifier.
    pub classifier: Option<PathBuf>,

    /// Path to the classifier labels file.
    pub labels: Option<PathBuf>,

    /// Version string recorded on every detection.
    ///
    /// Defaults to the classifier file stem.
    pub model_version: Option<String>,

    /// Number of ranked labels kept per classification.
    pub top_k: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            detector: None,
            classifier: None,
            labels: None,
            model_version: None,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ModelsConfig {
    /// Version string for the configured classifier.
    pub fn resolved_version(&self) -> String {
        self.model_version.clone().unwrap_or_else(|| {
            self.classifier
                .as_ref()
                .and_then(|p| p.file_stem())
                .map_or_else(|| "unknown".to_string(), |s| s.to_string_lossy().into_owned())
        })
    }
}

/// Per-image processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Minimum classification confidence kept.
    pub min_confidence: f32,

    /// Minimum detector confidence for a box to be classified.
    pub detection_threshold: f32,

    /// Per-image time limit in seconds.
    pub image_timeout_secs: u64,

    /// Longest image side handed to the detector.
    pub max_image_dimension: u32,

    /// Seed for the enhancement random stream; random when unset.
    pub seed: Option<u64>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            image_timeout_secs: DEFAULT_IMAGE_TIMEOUT_SECS,
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            seed: None,
        }
    }
}

/// Inference device configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InferenceDevice {
    /// Automatically select (GPU if available, else CPU).
    #[default]
    Auto,
    /// Force GPU (CUDA), fail if unavailable.
    Gpu,
    /// Force CPU inference.
    Cpu,
}

/// Inference settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Device to use for inference.
    pub device: InferenceDevice,
}

/// Species enhancement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Map generic and foreign labels to regional species.
    pub enabled: bool,

    /// TOML file replacing the built-in enhancement tables.
    pub tables_file: Option<PathBuf>,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tables_file: None,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Artifacts written after a run.
    pub formats: Vec<OutputFormat>,

    /// Prefix CSV files with a UTF-8 byte order mark.
    pub csv_bom: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Json],
            csv_bom: false,
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Batch JSON document.
    Json,
    /// One CSV row per detection.
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
