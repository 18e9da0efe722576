//! Capture metadata extraction.
//!
//! Walks an image directory and resolves, for each image, the camera
//! location, the camera reference and the capture time. Two layouts are
//! understood:
//!
//! - nested: `<root>/<location>/<datetime-token>/<image>`
//! - flat: `<root>/[<camera>/]<PREFIX>_<YYMMDD>_<HHMM>_<CAMERAREF>.<ext>`
//!
//! Capture time falls back through path tokens, EXIF and the file
//! modification time. Every resolved time outside the plausibility window
//! is replaced by the scan time.

pub mod timestamp;

use crate::constants::scan::{IMAGE_EXTENSIONS, MIN_IMAGE_DIMENSION};
use crate::error::{Error, Result};
use crate::records::{ImageMetadata, TimestampSource};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A file that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    /// Path of the file.
    pub path: PathBuf,
    /// Why it was rejected.
    pub reason: String,
}

/// Result of scanning a directory tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Accepted images, sorted by path.
    pub images: Vec<ImageMetadata>,
    /// Image files that failed validation.
    pub failed: Vec<FailedFile>,
    /// Files with unsupported extensions.
    pub skipped: Vec<PathBuf>,
}

/// Directory scanner producing [`ImageMetadata`].
#[derive(Debug, Clone, Default)]
pub struct MetadataScanner {
    now: Option<NaiveDateTime>,
}

impl MetadataScanner {
    /// Scanner that checks timestamps against the current local time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanner that checks timestamps against a fixed reference time.
    #[must_use]
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| Local::now().naive_local())
    }

    /// Scan `root` recursively.
    ///
    /// Only a missing root is an error; every per-file problem is recorded
    /// in the report.
    pub fn scan(&self, root: &Path) -> Result<ScanReport> {
        if !root.is_dir() {
            return Err(Error::InputDirNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut report = ScanReport::default();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    warn!("Cannot read {}: {}", path.display(), e);
                    report.failed.push(FailedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !is_image_file(path) {
                debug!("Skipping unsupported file {}", path.display());
                report.skipped.push(path.to_path_buf());
                continue;
            }

            match self.inspect(root, path) {
                Ok(metadata) => report.images.push(metadata),
                Err(e) => {
                    warn!("Rejecting {}: {}", path.display(), e);
                    report.failed.push(FailedFile {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.images.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        info!(
            "Scanned {}: {} images, {} failed, {} skipped",
            root.display(),
            report.images.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Validate one image and resolve its metadata.
    pub fn inspect(&self, root: &Path, path: &Path) -> Result<ImageMetadata> {
        validate_image(path)?;

        let dirs = directory_segments(root, path);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (location, camera_reference, resolved) = if dirs.len() >= 2 {
            let location = dirs[0].clone();
            let third = dirs.get(2).map_or_else(
                || timestamp::parse_datetime_token(&stem).map(|ts| (ts, TimestampSource::Filename)),
                |segment| {
                    timestamp::parse_datetime_token(segment)
                        .map(|ts| (ts, TimestampSource::DirectoryName))
                },
            );
            let resolved = timestamp::parse_datetime_token(&dirs[1])
                .map(|ts| (ts, TimestampSource::DirectoryName))
                .or(third);
            (location.clone(), location, resolved)
        } else {
            let fallback_name = dirs.first().cloned().unwrap_or_else(|| dir_name(root));
            match timestamp::parse_filename_token(&stem) {
                Some(token) => (
                    fallback_name,
                    token.camera,
                    token.timestamp.map(|ts| (ts, TimestampSource::Filename)),
                ),
                None => (fallback_name.clone(), fallback_name, None),
            }
        };

        let (timestamp, timestamp_source) = self.settle_timestamp(path, resolved);

        Ok(ImageMetadata {
            file_path: path.to_path_buf(),
            location,
            timestamp,
            camera_reference,
            timestamp_source,
        })
    }

    /// Finish the fallback chain and apply the plausibility check.
    fn settle_timestamp(
        &self,
        path: &Path,
        resolved: Option<(NaiveDateTime, TimestampSource)>,
    ) -> (NaiveDateTime, TimestampSource) {
        let now = self.now();
        let resolved = resolved
            .or_else(|| timestamp::exif_timestamp(path).map(|ts| (ts, TimestampSource::Exif)))
            .or_else(|| {
                timestamp::modified_timestamp(path).map(|ts| (ts, TimestampSource::FileModified))
            });

        match resolved {
            Some((ts, source)) if timestamp::is_plausible(ts, now) => (ts, source),
            Some((ts, source)) => {
                warn!(
                    "Implausible capture time {} ({:?}) for {}, using current time",
                    ts,
                    source,
                    path.display()
                );
                (now, TimestampSource::Fallback)
            }
            None => (now, TimestampSource::Fallback),
        }
    }
}

/// Check if a file has a supported image extension.
fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(OsStr::new(known)))
    })
}

/// Read the image header and check its dimensions.
fn validate_image(path: &Path) -> Result<(u32, u32)> {
    let open_error = |source: image::ImageError| Error::ImageOpen {
        path: path.to_path_buf(),
        source,
    };

    let (width, height) = image::ImageReader::open(path)
        .map_err(|e| open_error(e.into()))?
        .with_guessed_format()
        .map_err(|e| open_error(e.into()))?
        .into_dimensions()
        .map_err(open_error)?;

    if width < MIN_IMAGE_DIMENSION || height < MIN_IMAGE_DIMENSION {
        return Err(Error::ImageTooSmall {
            path: path.to_path_buf(),
            width,
            height,
        });
    }
    Ok((width, height))
}

/// Directory names between `root` and the file.
fn directory_segments(root: &Path, path: &Path) -> Vec<String> {
    path.strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .map(|parent| {
            parent
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn dir_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::RgbImage;
    use std::fs;
    use tempfile::TempDir;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 13)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn write_png(path: &Path, side: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::new(side, side).save(path).unwrap();
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.jpg")));
        assert!(is_image_file(Path::new("a.JPEG")));
        assert!(is_image_file(Path::new("a.Tif")));
        assert!(is_image_file(Path::new("kuva_ä.png")));
        assert!(!is_image_file(Path::new("a.gif")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("jpg")));
    }

    #[test]
    fn test_flat_filename_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Aufnahme_250612_0001_BYWP9.png");
        write_png(&path, 64);

        let meta = MetadataScanner::new()
            .with_now(now())
            .inspect(dir.path(), &path)
            .unwrap();
        assert_eq!(meta.camera_reference, "BYWP9");
        assert_eq!(
            meta.timestamp,
            NaiveDate::from_ymd_opt(2025, 6, 12)
                .unwrap()
                .and_hms_opt(0, 1, 0)
                .unwrap()
        );
        assert_eq!(meta.timestamp_source, TimestampSource::Filename);
    }

    #[test]
    fn test_nested_layout_uses_directory_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ridge").join("2025-06-10_07-27-00").join("IMG_0001.png");
        write_png(&path, 64);

        let meta = MetadataScanner::new()
            .with_now(now())
            .inspect(dir.path(), &path)
            .unwrap();
        assert_eq!(meta.location, "ridge");
        assert_eq!(meta.camera_reference, "ridge");
        assert_eq!(meta.timestamp_source, TimestampSource::DirectoryName);
        assert_eq!(meta.timestamp.to_string(), "2025-06-10 07:27:00");
    }

    #[test]
    fn test_nested_layout_falls_back_to_file_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ridge").join("batch-a").join("20250611_221500.png");
        write_png(&path, 64);

        let meta = MetadataScanner::new()
            .with_now(now())
            .inspect(dir.path(), &path)
            .unwrap();
        assert_eq!(meta.timestamp_source, TimestampSource::Filename);
        assert_eq!(meta.timestamp.to_string(), "2025-06-11 22:15:00");
    }

    #[test]
    fn test_nested_layout_reads_third_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir
            .path()
            .join("ridge")
            .join("batch-a")
            .join("2025-06-10")
            .join("IMG_0001.png");
        write_png(&path, 64);

        let meta = MetadataScanner::new()
            .with_now(now())
            .inspect(dir.path(), &path)
            .unwrap();
        assert_eq!(meta.camera_reference, "ridge");
        assert_eq!(meta.timestamp_source, TimestampSource::DirectoryName);
        assert_eq!(meta.timestamp.to_string(), "2025-06-10 00:00:00");
    }

    #[test]
    fn test_flat_token_with_bad_date_keeps_camera() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CAM07").join("Aufnahme_251312_0001_BYWP9.png");
        write_png(&path, 64);

        let meta = MetadataScanner::new().inspect(dir.path(), &path).unwrap();
        assert_eq!(meta.camera_reference, "BYWP9");
        assert_eq!(meta.location, "CAM07");
        assert_eq!(meta.timestamp_source, TimestampSource::FileModified);
    }

    #[test]
    fn test_flat_without_token_uses_parent_and_file_time() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CAM07").join("IMG_0001.png");
        write_png(&path, 64);

        let meta = MetadataScanner::new().inspect(dir.path(), &path).unwrap();
        assert_eq!(meta.camera_reference, "CAM07");
        assert_eq!(meta.location, "CAM07");
        assert_eq!(meta.timestamp_source, TimestampSource::FileModified);
    }

    #[test]
    fn test_implausible_timestamp_is_replaced() {
        let dir = TempDir::new().unwrap();
        // eleven years before the reference time
        let path = dir.path().join("Aufnahme_140612_0001_BYWP9.png");
        write_png(&path, 64);

        let meta = MetadataScanner::new()
            .with_now(now())
            .inspect(dir.path(), &path)
            .unwrap();
        assert_eq!(meta.timestamp, now());
        assert_eq!(meta.timestamp_source, TimestampSource::Fallback);
        assert_eq!(meta.camera_reference, "BYWP9");
    }

    #[test]
    fn test_near_future_timestamp_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Aufnahme_250613_1400_BYWP9.png");
        write_png(&path, 64);

        let meta = MetadataScanner::new()
            .with_now(now())
            .inspect(dir.path(), &path)
            .unwrap();
        assert_eq!(meta.timestamp.to_string(), "2025-06-13 14:00:00");
        assert_eq!(meta.timestamp_source, TimestampSource::Filename);
    }

    #[test]
    fn test_scan_records_failures_and_skips() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("Aufnahme_250612_0001_BYWP9.png"), 64);
        write_png(&dir.path().join("tiny.png"), 8);
        fs::write(dir.path().join("broken.jpg"), b"not an image").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let report = MetadataScanner::new().with_now(now()).scan(dir.path()).unwrap();
        assert_eq!(report.images.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.failed.iter().any(|f| f.reason.contains("too small")));
    }

    #[test]
    fn test_scan_missing_root() {
        let result = MetadataScanner::new().scan(Path::new("/nonexistent/trailcam"));
        assert!(matches!(result, Err(Error::InputDirNotFound { .. })));
    }
}
