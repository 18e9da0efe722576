//! Output placement and writing for a finished batch.

use crate::config::OutputFormat;
use crate::constants::output_files;
use crate::error::Result;
use crate::output::{CsvWriter, DetectionRow, OutputWriter, write_results_json, write_rows};
use crate::records::ProcessingResults;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options for writing batch artifacts.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Output directory (None = the input root).
    pub output_dir: Option<PathBuf>,
    /// Output formats to generate.
    pub formats: Vec<OutputFormat>,
    /// Prefix CSV files with a UTF-8 BOM.
    pub csv_bom: bool,
}

/// Determine the output directory for a batch rooted at `input_root`.
pub fn output_dir_for(input_root: &Path, explicit_output_dir: Option<&Path>) -> PathBuf {
    explicit_output_dir.map_or_else(|| input_root.to_path_buf(), Path::to_path_buf)
}

/// Get the artifact path for a given format.
pub fn output_path_for(output_dir: &Path, format: OutputFormat) -> PathBuf {
    let file_name = match format {
        OutputFormat::Json => output_files::JSON,
        OutputFormat::Csv => output_files::CSV,
    };
    output_dir.join(file_name)
}

/// Write every requested artifact for `results`.
///
/// Returns the written paths in format order.
pub fn write_outputs(
    results: &ProcessingResults,
    input_root: &Path,
    options: &OutputOptions,
) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir_for(input_root, options.output_dir.as_deref());
    std::fs::create_dir_all(&output_dir)?;

    let mut written = Vec::with_capacity(options.formats.len());
    for format in &options.formats {
        let path = output_path_for(&output_dir, *format);
        debug!("Writing {} output: {}", format, path.display());

        match format {
            OutputFormat::Json => write_results_json(&path, results)?,
            OutputFormat::Csv => {
                let mut writer: Box<dyn OutputWriter> =
                    Box::new(CsvWriter::new(&path, options.csv_bom)?);
                write_rows(writer.as_mut(), &DetectionRow::from_results(results))?;
            }
        }

        info!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}
