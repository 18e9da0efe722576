//! Reading and writing the TOML configuration file.

use crate::config::{Config, config_file_path};
use crate::constants::APP_NAME;
use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parse the configuration at `path`; a missing file yields the defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    debug!("Loading config from {}", path.display());
    toml::from_str(&contents).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the configuration from [`config_file_path`].
///
/// Falls back to the defaults when no config location can be determined.
pub fn load_default_config() -> Result<Config> {
    match config_file_path() {
        Ok(path) => load_config_file(&path),
        Err(e) => {
            debug!("{e}, using default config");
            Ok(Config::default())
        }
    }
}

/// Write `config` to `path`, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let write_error = |source| Error::ConfigWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }

    let body = toml::to_string_pretty(config).map_err(|source| Error::ConfigSerialize { source })?;
    let contents = format!(
        "# {APP_NAME} configuration\n\
         # Set models.detector, models.classifier and models.labels before processing.\n\n\
         {body}"
    );
    std::fs::write(path, contents).map_err(write_error)
}

/// Write `config` to [`config_file_path`] and return where it went.
pub fn save_default_config(config: &Config) -> Result<PathBuf> {
    let path = config_file_path()?;
    save_config(config, &path)?;
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::{InferenceDevice, OutputFormat};
    use crate::constants::DEFAULT_TOP_K;
    use tempfile::TempDir;

    fn write(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config_file(Path::new("/nonexistent/trailcam/config.toml")).unwrap();
        assert!(config.models.detector.is_none());
        assert!(config.enhancement.enabled);
        assert_eq!(config.output.formats, vec![OutputFormat::Json]);
    }

    #[test]
    fn test_camera_trap_config_parses() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
[models]
detector = "/models/md_v5a.onnx"
classifier = "/models/amazon.onnx"
labels = "/models/amazon_labels.txt"

[processing]
min_confidence = 0.25
seed = 7

[inference]
device = "cpu"

[output]
formats = ["json", "csv"]
"#,
        );

        let config = load_config_file(&path).unwrap();
        assert_eq!(
            config.models.detector.as_deref(),
            Some(Path::new("/models/md_v5a.onnx"))
        );
        assert_eq!(config.processing.min_confidence, 0.25);
        assert_eq!(config.processing.seed, Some(7));
        assert_eq!(config.inference.device, InferenceDevice::Cpu);
        assert_eq!(config.output.formats, vec![OutputFormat::Json, OutputFormat::Csv]);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[enhancement]\ntables_file = \"/srv/tables/alps.toml\"\n");

        let config = load_config_file(&path).unwrap();
        assert!(config.enhancement.enabled);
        assert_eq!(
            config.enhancement.tables_file.as_deref(),
            Some(Path::new("/srv/tables/alps.toml"))
        );
        assert_eq!(config.models.top_k, DEFAULT_TOP_K);
        assert_eq!(config.processing.detection_threshold, 0.25);
    }

    #[test]
    fn test_malformed_toml_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[processing\nmin_confidence = ");

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(&err, Error::ConfigParse { path: p, .. } if *p == path));
    }

    #[test]
    fn test_saved_file_has_header_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ridge").join("config.toml");
        let mut config = Config::default();
        config.processing.image_timeout_secs = 12;
        config.inference.device = InferenceDevice::Gpu;

        save_config(&config, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# trailcam configuration"));
        let loaded = load_config_file(&path).unwrap();
        assert_eq!(loaded.processing.image_timeout_secs, 12);
        assert_eq!(loaded.inference.device, InferenceDevice::Gpu);
    }
}
