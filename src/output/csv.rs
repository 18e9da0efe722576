//! CSV output format writer.

use crate::constants::{UTF8_BOM, confidence::DECIMAL_PLACES};
use crate::error::{Error, Result};
use crate::output::{DetectionRow, OutputWriter};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Column names, in write order.
pub const CSV_HEADER: [&str; 13] = [
    "camera",
    "image",
    "timestamp",
    "species",
    "confidence",
    "x",
    "y",
    "width",
    "height",
    "uncertain",
    "classification_model",
    "alternative_species",
    "original_classification",
];

/// CSV format output writer.
pub struct CsvWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl CsvWriter {
    /// Create a new CSV writer, optionally starting the file with a UTF-8 BOM.
    pub fn new(path: &Path, with_bom: bool) -> Result<Self> {
        let mut file = File::create(path)?;
        if with_bom {
            file.write_all(UTF8_BOM)?;
        }
        Ok(Self {
            writer: csv::Writer::from_writer(file),
            path: path.to_path_buf(),
        })
    }

    fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(record)
            .map_err(|source| Error::CsvWrite {
                path: self.path.clone(),
                source,
            })
    }
}

impl OutputWriter for CsvWriter {
    fn write_header(&mut self) -> Result<()> {
        self.write_record(CSV_HEADER)
    }

    fn write_detection(&mut self, row: &DetectionRow) -> Result<()> {
        let record = [
            row.camera_reference.clone(),
            row.image_path.display().to_string(),
            row.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            row.species.clone(),
            format!("{:.decimal$}", row.confidence, decimal = DECIMAL_PLACES),
            row.x.to_string(),
            row.y.to_string(),
            row.width.to_string(),
            row.height.to_string(),
            row.is_uncertain.to_string(),
            row.classification_model.clone(),
            row.alternatives_text(),
            row.original_classification.clone().unwrap_or_default(),
        ];
        self.write_record(record)
    }

    fn finalize(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
