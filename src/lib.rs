//! trailcam - camera trap image analysis CLI tool.
//!
//! Scans a directory of camera trap images, detects animals with an ONNX
//! detector, classifies each detection with an ONNX species classifier and
//! maps generic or out-of-region labels to regional species using
//! contextual signals.

#![warn(missing_docs)]

pub mod cli;
pub mod combiner;
pub mod config;
pub mod constants;
pub mod enhance;
pub mod error;
pub mod inference;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod records;

use clap::Parser;
use cli::{Cli, Command, ProcessArgs, ScanArgs};
use config::{
    Config, InferenceDevice, config_file_path, load_default_config, resolve_model_files,
    save_default_config, validate_config,
};
use enhance::{EnhancementTables, SpeciesEnhancer, load_tables};
use inference::{OnnxClassifier, OnnxDetector, describe_device};
use metadata::{MetadataScanner, ScanReport};
use pipeline::{OutputOptions, Processor, ProcessorSettings, write_outputs};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

pub use error::{Error, Result};

/// Main entry point for trailcam CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config = load_default_config()?;

    match cli.command {
        Some(command) => handle_command(command, &config, cli.quiet),
        None => {
            cli::help::print_smart_help(&config);
            Ok(())
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    // ORT logging is suppressed by default because CUDA fallback is expected in auto mode.
    let filter_str = if quiet {
        "warn,ort=off".to_string()
    } else {
        match verbose {
            0 => "info,ort=off".to_string(),
            1 => "debug,ort=warn".to_string(),
            2 => "trace,ort=info".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    fmt().with_writer(std::io::stderr).with_env_filter(filter).init();
}

fn handle_command(command: Command, config: &Config, quiet: bool) -> Result<()> {
    match command {
        Command::Process(args) => process_images(&args, config, quiet),
        Command::Scan(args) => scan_images(&args),
        Command::Config { action } => handle_config_command(action),
    }
}

/// Apply `process` flags on top of the loaded configuration.
pub fn apply_process_overrides(args: &ProcessArgs, config: &mut Config) {
    let models = &mut config.models;
    if args.detector.is_some() {
        models.detector.clone_from(&args.detector);
    }
    if args.classifier.is_some() {
        models.classifier.clone_from(&args.classifier);
    }
    if args.labels.is_some() {
        models.labels.clone_from(&args.labels);
    }
    if args.model_version.is_some() {
        models.model_version.clone_from(&args.model_version);
    }

    let processing = &mut config.processing;
    if let Some(value) = args.min_confidence {
        processing.min_confidence = value;
    }
    if let Some(value) = args.detection_threshold {
        processing.detection_threshold = value;
    }
    if let Some(value) = args.timeout {
        processing.image_timeout_secs = value;
    }
    if args.seed.is_some() {
        processing.seed = args.seed;
    }

    if args.gpu {
        config.inference.device = InferenceDevice::Gpu;
    } else if args.cpu {
        config.inference.device = InferenceDevice::Cpu;
    }

    if args.no_enhance {
        config.enhancement.enabled = false;
    }
    if args.tables.is_some() {
        config.enhancement.tables_file.clone_from(&args.tables);
    }

    if let Some(formats) = &args.format {
        config.output.formats.clone_from(formats);
    }
    if args.csv_bom {
        config.output.csv_bom = true;
    }
}

/// Build the species enhancer described by the configuration, if enabled.
pub fn build_enhancer(config: &Config) -> Result<Option<SpeciesEnhancer>> {
    if !config.enhancement.enabled {
        return Ok(None);
    }

    let tables = match &config.enhancement.tables_file {
        Some(path) => {
            info!("Loading enhancement tables: {}", path.display());
            load_tables(path)?
        }
        None => EnhancementTables::default(),
    };

    Ok(Some(match config.processing.seed {
        Some(seed) => SpeciesEnhancer::seeded(tables, seed),
        None => SpeciesEnhancer::from_os_rng(tables),
    }))
}

/// Run the full pipeline over a directory and write the outputs.
fn process_images(args: &ProcessArgs, config: &Config, quiet: bool) -> Result<()> {
    let mut config = config.clone();
    apply_process_overrides(args, &mut config);
    validate_config(&config)?;

    if !args.input.is_dir() {
        return Err(Error::InputDirNotFound {
            path: args.input.clone(),
        });
    }

    let model_files = resolve_model_files(&config.models)?;
    let device = config.inference.device;
    info!("Inference device: {}", describe_device(device));

    let detector = OnnxDetector::new(model_files.detector, device);
    let classifier = OnnxClassifier::new(
        model_files.classifier,
        &model_files.labels,
        config.models.resolved_version(),
        device,
        config.models.top_k,
    )?;
    info!("Loaded {} classifier labels", classifier.label_count());

    let mut processor = Processor::new(
        Box::new(detector),
        Box::new(classifier),
        ProcessorSettings::from(&config.processing),
    );
    if let Some(enhancer) = build_enhancer(&config)? {
        processor = processor.with_enhancer(enhancer);
    }

    let results = processor.process_directory(&args.input, !quiet)?;

    let options = OutputOptions {
        output_dir: args.output_dir.clone(),
        formats: config.output.formats.clone(),
        csv_bom: config.output.csv_bom,
    };
    write_outputs(&results, &args.input, &options)?;

    if !quiet && !args.no_summary {
        output::print_summary(&results)?;
    }

    let meta = &results.processing_metadata;
    if !meta.failed_images.is_empty() {
        warn!("{} image(s) failed", meta.failed_images.len());
    }
    info!(
        "Complete: {} of {} images processed, {} animals, {} skipped files, {:.1}s",
        meta.successful_detections,
        meta.total_images,
        meta.total_animals,
        meta.skipped_files,
        meta.processing_duration
    );

    Ok(())
}

/// Resolve capture metadata only and print it.
#[allow(clippy::print_stdout)]
fn scan_images(args: &ScanArgs) -> Result<()> {
    let report = MetadataScanner::new().scan(&args.input)?;

    if args.json {
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &report).map_err(|e| Error::JsonWrite {
            path: PathBuf::from("-"),
            source: e,
        })?;
        writeln!(stdout)?;
        return Ok(());
    }

    print_scan_report(&mut std::io::stdout().lock(), &report)?;
    Ok(())
}

/// Render a scan report as tab-separated lines.
pub fn print_scan_report<W: Write>(out: &mut W, report: &ScanReport) -> std::io::Result<()> {
    for image in &report.images {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            image.file_path.display(),
            image.camera_reference,
            image.location,
            image.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            image.timestamp_source.as_str()
        )?;
    }
    for failed in &report.failed {
        writeln!(out, "FAILED\t{}\t{}", failed.path.display(), failed.reason)?;
    }
    writeln!(
        out,
        "{} images, {} failed, {} skipped",
        report.images.len(),
        report.failed.len(),
        report.skipped.len()
    )
}

#[allow(clippy::print_stdout)]
fn handle_config_command(action: cli::ConfigAction) -> Result<()> {
    use cli::ConfigAction;

    match action {
        ConfigAction::Init => {
            let path = config_file_path()?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                let config = Config::default();
                let saved_path = save_default_config(&config)?;
                println!("Created configuration file: {}", saved_path.display());
                println!("\nNext steps:");
                println!("  set models.detector, models.classifier and models.labels in that file");
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_default_config()?;
            println!("{config:#?}");
            Ok(())
        }
        ConfigAction::Path => {
            let path = config_file_path()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
