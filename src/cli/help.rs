//! Help message display for CLI.

#![allow(clippy::print_stdout)]

use crate::config::{Config, ModelsConfig};

/// Whether both models are configured.
pub fn models_configured(models: &ModelsConfig) -> bool {
    models.detector.is_some() && models.classifier.is_some() && models.labels.is_some()
}

/// Print help message based on configuration state.
pub fn print_smart_help(config: &Config) {
    if models_configured(&config.models) {
        print_configured_help();
    } else {
        print_first_time_help();
    }
}

/// Print detailed setup guide for first-time users.
pub fn print_first_time_help() {
    println!("No models configured. Get started with trailcam:");
    println!();
    println!("1. Initialize configuration:");
    println!("   trailcam config init");
    println!();
    println!("2. Point the [models] section of the config file at your ONNX files:");
    println!("   detector   = \"/models/megadetector.onnx\"");
    println!("   classifier = \"/models/species.onnx\"");
    println!("   labels     = \"/models/species_labels.txt\"");
    println!();
    println!("3. Check that the image tree is understood:");
    println!("   trailcam scan /path/to/traps");
    println!();
    println!("4. Process the images:");
    println!("   trailcam process /path/to/traps --format json,csv");
    println!();
    println!("Run 'trailcam -h' for all options.");
}

/// Print brief usage reminder for configured users.
pub fn print_configured_help() {
    println!("Usage: trailcam process <DIR> [OPTIONS]");
    println!();
    println!("Example: trailcam process /data/traps -c 0.3 --format json,csv");
    println!();
    println!("Run 'trailcam -h' for all options or 'trailcam config show' to see settings.");
}
