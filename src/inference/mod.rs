//! Inference module: detector and classifier capabilities.
//!
//! The pipeline only talks to the [`AnimalDetector`] and
//! [`SpeciesClassifier`] traits. The ONNX backends in this module are the
//! production implementations; tests plug in scripted ones.

mod classifier;
mod detector;
pub mod normalize;
mod provider;
mod session;

pub use classifier::OnnxClassifier;
pub use detector::OnnxDetector;
pub use normalize::{
    RawClassification, RawDetections, RawLabel, normalize_classification, normalize_detections,
};
pub use provider::describe_device;
pub use session::LazySession;

use crate::error::Result;
use image::RgbImage;

/// Generic animal detector.
///
/// Returned boxes are in the pixel space of the image passed to `detect`.
pub trait AnimalDetector: Send + Sync {
    /// Backend identifier used in batch metadata.
    fn name(&self) -> &str;

    /// Load the model if needed. Safe to call from several threads.
    fn ensure_ready(&self) -> Result<()>;

    /// Run detection on a full frame.
    fn detect(&self, image: &RgbImage) -> Result<RawDetections>;
}

/// Species classifier for cropped detections.
pub trait SpeciesClassifier: Send + Sync {
    /// Backend identifier used in batch metadata.
    fn name(&self) -> &str;

    /// Version string recorded on every detection this classifier labels.
    fn model_version(&self) -> &str;

    /// Load the model if needed. Safe to call from several threads.
    fn ensure_ready(&self) -> Result<()>;

    /// Classify one crop.
    fn classify(&self, crop: &RgbImage) -> Result<RawClassification>;
}
