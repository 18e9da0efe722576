//! CLI argument definitions.

use crate::cli::validators::parse_confidence;
use crate::config::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Camera trap image analysis: animal detection, species classification and
/// regional species enhancement.
#[derive(Debug, Parser)]
#[command(name = "trailcam")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Suppress progress output and informational logging.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace+ORT info, -vvv: trace+ORT debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect and classify animals in every image under a directory.
    Process(ProcessArgs),
    /// Resolve capture metadata without running any model.
    Scan(ScanArgs),
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Arguments for the process command.
#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProcessArgs {
    /// Root directory of the camera trap images.
    pub input: PathBuf,

    /// Output directory (default: the input directory).
    #[arg(short, long, env = "TRAILCAM_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to the ONNX detector model (overrides config).
    #[arg(long, env = "TRAILCAM_DETECTOR")]
    pub detector: Option<PathBuf>,

    /// Path to the ONNX classifier model (overrides config).
    #[arg(long, env = "TRAILCAM_CLASSIFIER")]
    pub classifier: Option<PathBuf>,

    /// Path to the classifier labels file (overrides config).
    #[arg(long, env = "TRAILCAM_LABELS")]
    pub labels: Option<PathBuf>,

    /// Version string recorded on each detection.
    #[arg(long, env = "TRAILCAM_MODEL_VERSION")]
    pub model_version: Option<String>,

    /// Minimum classification confidence (0.0-1.0).
    #[arg(short = 'c', long, value_parser = parse_confidence, env = "TRAILCAM_MIN_CONFIDENCE")]
    pub min_confidence: Option<f32>,

    /// Minimum detector confidence for a box to be classified (0.0-1.0).
    #[arg(long, value_parser = parse_confidence, env = "TRAILCAM_DETECTION_THRESHOLD")]
    pub detection_threshold: Option<f32>,

    /// Per-image time limit in seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..), env = "TRAILCAM_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Seed for reproducible species enhancement.
    #[arg(long, env = "TRAILCAM_SEED")]
    pub seed: Option<u64>,

    /// Output formats (comma-separated: json,csv).
    #[arg(short, long, value_delimiter = ',', env = "TRAILCAM_FORMAT")]
    pub format: Option<Vec<OutputFormat>>,

    /// Enable CUDA GPU acceleration.
    #[arg(long, conflicts_with = "cpu")]
    pub gpu: bool,

    /// Force CPU inference.
    #[arg(long, conflicts_with = "gpu")]
    pub cpu: bool,

    /// Keep classifier labels as they are.
    #[arg(long)]
    pub no_enhance: bool,

    /// TOML file replacing the built-in enhancement tables.
    #[arg(long, env = "TRAILCAM_TABLES")]
    pub tables: Option<PathBuf>,

    /// Prefix CSV output with a UTF-8 byte order mark.
    #[arg(long)]
    pub csv_bom: bool,

    /// Do not print the per-camera summary.
    #[arg(long)]
    pub no_summary: bool,
}

/// Arguments for the scan command.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Root directory of the camera trap images.
    pub input: PathBuf,

    /// Print the scan report as JSON.
    #[arg(long)]
    pub json: bool,
}
