//! Where trailcam keeps its configuration file.

use crate::constants::{APP_NAME, CONFIG_FILE_NAME, CONFIG_PATH_ENV};
use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::ffi::OsString;
use std::path::PathBuf;

/// Platform configuration directory, e.g. `~/.config/trailcam/` on Linux.
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(Error::ConfigDirNotFound)
}

/// Path of the configuration file.
///
/// A non-empty `TRAILCAM_CONFIG` names the file directly.
pub fn config_file_path() -> Result<PathBuf> {
    resolve_config_path(std::env::var_os(CONFIG_PATH_ENV))
}

fn resolve_config_path(explicit: Option<OsString>) -> Result<PathBuf> {
    match explicit.filter(|value| !value.is_empty()) {
        Some(value) => Ok(PathBuf::from(value)),
        None => Ok(config_dir()?.join(CONFIG_FILE_NAME)),
    }
}
