//! Configuration validation.

use crate::config::{Config, ModelsConfig};
use crate::constants::{confidence, scan::MIN_IMAGE_DIMENSION};
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_processing(config)?;
    validate_models(&config.models)?;
    Ok(())
}

fn validate_unit_interval(name: &str, value: f32) -> Result<()> {
    if !(confidence::MIN..=confidence::MAX).contains(&value) {
        return Err(Error::ConfigValidation {
            message: format!(
                "{name} must be between {} and {}, got {value}",
                confidence::MIN,
                confidence::MAX
            ),
        });
    }
    Ok(())
}

/// Validate processing settings.
fn validate_processing(config: &Config) -> Result<()> {
    let processing = &config.processing;

    validate_unit_interval("min_confidence", processing.min_confidence)?;
    validate_unit_interval("detection_threshold", processing.detection_threshold)?;

    if processing.image_timeout_secs == 0 {
        return Err(Error::ConfigValidation {
            message: "image_timeout_secs must be at least 1".to_string(),
        });
    }

    if processing.max_image_dimension < MIN_IMAGE_DIMENSION {
        return Err(Error::ConfigValidation {
            message: format!(
                "max_image_dimension must be at least {MIN_IMAGE_DIMENSION}, got {}",
                processing.max_image_dimension
            ),
        });
    }

    Ok(())
}

fn validate_models(models: &ModelsConfig) -> Result<()> {
    if models.top_k == 0 {
        return Err(Error::ConfigValidation {
            message: "top_k must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Model files needed to run the ONNX backends.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    /// Detector model.
    pub detector: PathBuf,
    /// Classifier model.
    pub classifier: PathBuf,
    /// Classifier labels.
    pub labels: PathBuf,
}

/// Resolve and check the configured model files.
pub fn resolve_model_files(models: &ModelsConfig) -> Result<ModelFiles> {
    let detector = models
        .detector
        .clone()
        .ok_or(Error::ModelNotConfigured { role: "detector" })?;
    let classifier = models
        .classifier
        .clone()
        .ok_or(Error::ModelNotConfigured { role: "classifier" })?;
    let labels = models
        .labels
        .clone()
        .ok_or(Error::ModelNotConfigured { role: "labels" })?;

    for path in [&detector, &classifier] {
        if !path.exists() {
            return Err(Error::ModelFileNotFound { path: path.clone() });
        }
    }
    if !labels.exists() {
        return Err(Error::LabelsFileNotFound { path: labels });
    }

    Ok(ModelFiles {
        detector,
        classifier,
        labels,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_confidence() {
        let mut config = Config::default();
        config.processing.min_confidence = 1.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_invalid_detection_threshold() {
        let mut config = Config::default();
        config.processing.detection_threshold = -0.1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.processing.image_timeout_secs = 0;
        assert!(matches!(
            validate_config(&config),
            Err(Error::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_validate_zero_top_k() {
        let mut config = Config::default();
        config.models.top_k = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_resolve_model_files_reports_missing_role() {
        let models = ModelsConfig::default();
        let result = resolve_model_files(&models);
        assert!(matches!(
            result,
            Err(Error::ModelNotConfigured { role: "detector" })
        ));
    }

    #[test]
    fn test_resolve_model_files_checks_existence() {
        let detector = NamedTempFile::new().unwrap();
        let models = ModelsConfig {
            detector: Some(detector.path().to_path_buf()),
            classifier: Some(PathBuf::from("/nonexistent/classifier.onnx")),
            labels: Some(PathBuf::from("/nonexistent/labels.txt")),
            ..ModelsConfig::default()
        };
        assert!(matches!(
            resolve_model_files(&models),
            Err(Error::ModelFileNotFound { .. })
        ));
    }
}
