//! Processing pipeline components.

mod coordinator;
mod processor;

pub use coordinator::{OutputOptions, output_dir_for, output_path_for, write_outputs};
pub use processor::{Processor, ProcessorSettings};
