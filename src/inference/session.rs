//! Lazily loaded ONNX session guarded by a mutex.
//!
//! The first caller loads the model while holding the lock; concurrent first
//! callers block until the load finishes, so the session is built exactly
//! once. Inference also runs under the lock because `Session::run` needs
//! exclusive access.

use crate::config::InferenceDevice;
use crate::error::{Error, Result};
use crate::inference::provider::configure_device;
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// An ONNX session that is built on first use.
pub struct LazySession {
    path: PathBuf,
    device: InferenceDevice,
    session: Mutex<Option<Session>>,
}

impl LazySession {
    /// Create an unloaded session handle.
    pub fn new(path: impl Into<PathBuf>, device: InferenceDevice) -> Self {
        Self {
            path: path.into(),
            device,
            session: Mutex::new(None),
        }
    }

    /// Whether the session has been built.
    pub fn is_loaded(&self) -> bool {
        self.session.lock().is_ok_and(|guard| guard.is_some())
    }

    /// Build the session if it is not loaded yet.
    pub fn ensure_loaded(&self) -> Result<()> {
        self.with_session(|_| Ok(()))
    }

    /// Run `f` with exclusive access to the loaded session.
    pub fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let mut guard = self.session.lock().map_err(|_| Error::Internal {
            message: format!("session lock poisoned for {}", self.path.display()),
        })?;

        if guard.is_none() {
            *guard = Some(build_session(&self.path, self.device)?);
        }

        let session = guard.as_mut().ok_or_else(|| Error::Internal {
            message: "session missing after load".to_string(),
        })?;
        f(session)
    }
}

fn build_session(path: &Path, device: InferenceDevice) -> Result<Session> {
    if !path.exists() {
        return Err(Error::ModelFileNotFound {
            path: path.to_path_buf(),
        });
    }

    debug!("Building ONNX session for {}", path.display());
    let builder = Session::builder().map_err(|e| Error::ModelLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let (mut builder, device_label) = configure_device(builder, device, path)?;

    let session = builder.commit_from_file(path).map_err(|e| Error::ModelLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    info!("Loaded model: {} (device: {})", path.display(), device_label);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file_is_reported() {
        let session = LazySession::new("/nonexistent/model.onnx", InferenceDevice::Cpu);
        assert!(!session.is_loaded());
        let result = session.ensure_loaded();
        assert!(matches!(result, Err(Error::ModelFileNotFound { .. })));
        assert!(!session.is_loaded());
    }
}
