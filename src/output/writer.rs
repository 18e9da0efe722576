//! Output writer trait definition.

use crate::error::Result;
use crate::output::DetectionRow;

/// Trait for writing detection rows.
pub trait OutputWriter {
    /// Write the file header (if applicable).
    fn write_header(&mut self) -> Result<()>;

    /// Write a single detection.
    fn write_detection(&mut self, row: &DetectionRow) -> Result<()>;

    /// Finalize the output (flush, close, etc.).
    fn finalize(&mut self) -> Result<()>;
}

/// Write every row through `writer`, header first.
pub fn write_rows(writer: &mut dyn OutputWriter, rows: &[DetectionRow]) -> Result<()> {
    writer.write_header()?;
    for row in rows {
        writer.write_detection(row)?;
    }
    writer.finalize()
}
