//! Per-camera summary table printed after a run.

use crate::records::ProcessingResults;
use std::collections::HashMap;
use std::io::{self, Write};

/// Counts for one camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSummary {
    /// Camera reference.
    pub camera: String,
    /// Images processed for this camera.
    pub images: usize,
    /// Animal detections.
    pub animals: usize,
    /// Detections flagged as uncertain.
    pub uncertain: usize,
    /// Detections whose label came from enhancement.
    pub enhanced: usize,
    /// Most frequent species and its count; ties go to the name first in
    /// lexical order.
    pub top_species: Option<(String, usize)>,
}

/// Summarize a batch per camera, cameras in lexical order.
pub fn summarize(results: &ProcessingResults) -> Vec<CameraSummary> {
    results
        .results_by_camera
        .iter()
        .map(|(camera, images)| {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            let mut summary = CameraSummary {
                camera: camera.clone(),
                images: images.len(),
                animals: 0,
                uncertain: 0,
                enhanced: 0,
                top_species: None,
            };

            for detection in images.iter().flat_map(|r| &r.detections) {
                summary.animals += 1;
                summary.uncertain += usize::from(detection.is_uncertain);
                summary.enhanced += usize::from(detection.enhancement_metadata.is_some());
                *counts.entry(detection.species.as_str()).or_default() += 1;
            }

            summary.top_species = counts
                .into_iter()
                .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
                .map(|(name, count)| (name.to_string(), count));
            summary
        })
        .collect()
}

/// Render the summary as an aligned text table.
pub fn write_summary<W: Write>(out: &mut W, rows: &[CameraSummary]) -> io::Result<()> {
    let width = rows
        .iter()
        .map(|r| r.camera.len())
        .chain(std::iter::once("Camera".len()))
        .max()
        .unwrap_or_default();

    writeln!(
        out,
        "{:<width$}  {:>6}  {:>7}  {:>9}  {:>8}  Top species",
        "Camera", "Images", "Animals", "Uncertain", "Enhanced"
    )?;
    for row in rows {
        let top = row
            .top_species
            .as_ref()
            .map_or_else(|| "-".to_string(), |(name, count)| format!("{name} ({count})"));
        writeln!(
            out,
            "{:<width$}  {:>6}  {:>7}  {:>9}  {:>8}  {top}",
            row.camera, row.images, row.animals, row.uncertain, row.enhanced
        )?;
    }
    Ok(())
}

/// Print the summary table to stdout.
pub fn print_summary(results: &ProcessingResults) -> io::Result<()> {
    let rows = summarize(results);
    if rows.is_empty() {
        return Ok(());
    }
    write_summary(&mut io::stdout().lock(), &rows)
}
