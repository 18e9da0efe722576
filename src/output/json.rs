//! Batch JSON document.
//!
//! The document is [`ProcessingResults`] serialized as-is:
//! `processing_metadata` followed by `results_by_camera`, cameras in
//! lexical order.

use crate::error::{Error, Result};
use crate::records::ProcessingResults;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Write the batch document with pretty printing.
pub fn write_results_json(path: &Path, results: &ProcessingResults) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, results).map_err(|e| Error::JsonWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    writer.flush()?;

    debug!("Wrote batch document to {}", path.display());
    Ok(())
}

/// Load a batch document written by [`write_results_json`].
pub fn read_results_json(path: &Path) -> Result<ProcessingResults> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::JsonRead {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AnimalDetection, BoundingBox, DetectionResult, ModelInfo};
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn sample_results() -> ProcessingResults {
        let mut results = ProcessingResults::default();
        results.processing_metadata.total_images = 2;
        results.processing_metadata.successful_detections = 1;
        results.processing_metadata.failed_images = vec![PathBuf::from("/traps/broken.jpg")];
        results.processing_metadata.processing_duration = 1.25;
        results.processing_metadata.model_info = ModelInfo {
            detector: "megadetector".to_string(),
            classifier: "amazon".to_string(),
            model_version: "v1".to_string(),
        };
        results.results_by_camera.insert(
            "BYWP9".to_string(),
            vec![DetectionResult {
                image_path: PathBuf::from("/traps/Aufnahme_250612_0001_BYWP9.jpg"),
                camera_reference: "BYWP9".to_string(),
                timestamp: NaiveDate::from_ymd_opt(2025, 6, 12)
                    .and_then(|d| d.and_hms_opt(0, 1, 0))
                    .expect("valid date"),
                detections: vec![AnimalDetection::new(
                    "Red Fox",
                    0.42,
                    BoundingBox::from_corners([1.0, 2.0, 30.0, 40.0]),
                    "v1",
                )],
                model_version: "v1".to_string(),
            }],
        );
        results
    }

    #[test]
    fn test_json_document_layout() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("results.json");
        write_results_json(&path, &sample_results()).expect("write json");

        let content = std::fs::read_to_string(&path).expect("read file");
        let value: serde_json::Value = serde_json::from_str(&content).expect("parse JSON");

        let meta = &value["processing_metadata"];
        assert_eq!(meta["total_images"], 2);
        assert_eq!(meta["successful_detections"], 1);
        assert_eq!(meta["failed_images"][0], "/traps/broken.jpg");
        assert_eq!(meta["model_info"]["model_version"], "v1");

        let image = &value["results_by_camera"]["BYWP9"][0];
        assert_eq!(image["timestamp"], "2025-06-12T00:01:00");
        assert_eq!(image["detections"][0]["species"], "Red Fox");
        assert_eq!(image["detections"][0]["is_uncertain"], true);
        assert!(content.contains('\n'), "document is pretty printed");
    }

    #[test]
    fn test_json_document_reads_back() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("results.json");
        let results = sample_results();
        write_results_json(&path, &results).expect("write json");

        let loaded = read_results_json(&path).expect("read json");
        assert_eq!(loaded.processing_metadata.model_info, results.processing_metadata.model_info);
        assert_eq!(loaded.results_by_camera, results.results_by_camera);
    }

    #[test]
    fn test_read_rejects_malformed_document() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("results.json");
        std::fs::write(&path, "{\"processing_metadata\": 3}").expect("write file");
        assert!(matches!(
            read_results_json(&path),
            Err(Error::JsonRead { .. })
        ));
    }
}
