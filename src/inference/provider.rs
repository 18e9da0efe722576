//! Execution provider selection for ONNX sessions.

use crate::config::InferenceDevice;
use crate::error::{Error, Result};
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::builder::SessionBuilder;
use std::path::Path;
use tracing::{info, warn};

/// Human-readable description of a device setting.
pub fn describe_device(device: InferenceDevice) -> &'static str {
    match device {
        InferenceDevice::Auto => "Auto (GPU if available, fallback to CPU)",
        InferenceDevice::Gpu => "GPU (CUDA)",
        InferenceDevice::Cpu => "CPU",
    }
}

/// Register execution providers on a session builder for the requested device.
///
/// Returns the builder and a short label of what was selected, for logging.
pub fn configure_device(
    builder: SessionBuilder,
    device: InferenceDevice,
    model_path: &Path,
) -> Result<(SessionBuilder, &'static str)> {
    if device == InferenceDevice::Cpu {
        info!("Requested device: CPU");
        return Ok((builder, "CPU"));
    }

    let cuda = CUDAExecutionProvider::default();
    let cuda_available = cuda.is_available().unwrap_or(false);

    match (device, cuda_available) {
        (InferenceDevice::Gpu, false) => {
            warn!("--gpu requested but CUDA provider is not available, using CPU");
            Ok((builder, "GPU (fallback to CPU)"))
        }
        (_, false) => {
            info!("Auto mode: no GPU provider available, using CPU");
            Ok((builder, "Auto (CPU)"))
        }
        (_, true) => {
            info!("CUDA provider available, attempting GPU");
            let builder = builder
                .with_execution_providers([cuda.build()])
                .map_err(|e| Error::ModelLoad {
                    path: model_path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            Ok((builder, "CUDA"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_device() {
        assert_eq!(describe_device(InferenceDevice::Cpu), "CPU");
        assert!(describe_device(InferenceDevice::Auto).contains("fallback"));
        assert!(describe_device(InferenceDevice::Gpu).contains("CUDA"));
    }
}
