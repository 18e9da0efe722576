//! Batch artifact writers.

mod csv;
mod json;
pub mod progress;
mod summary;
mod types;
mod writer;

pub use csv::{CSV_HEADER, CsvWriter};
pub use json::{read_results_json, write_results_json};
pub use summary::{CameraSummary, print_summary, summarize, write_summary};
pub use types::{ALTERNATIVES_SEPARATOR, DetectionRow};
pub use writer::{OutputWriter, write_rows};
