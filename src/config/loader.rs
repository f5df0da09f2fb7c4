// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::RawConfigFile;
use crate::config::validate::Settings;
use crate::errors::{LaunchgateError, Result};

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; use [`load_settings`] for
/// validation and path resolution.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load, apply the CLI override, resolve paths, validate.
///
/// - A relative `[backend].path` resolves against the config file's
///   directory.
/// - `backend_override` (from `--backend`) wins over the file and resolves
///   against the current directory.
/// - A missing config file is only tolerated when the backend is given on
///   the command line; every other setting then takes its default.
pub fn load_settings(config_path: &Path, backend_override: Option<&Path>) -> Result<Settings> {
    let mut raw = if config_path.is_file() {
        load_from_path(config_path)?
    } else if backend_override.is_some() {
        debug!(path = %config_path.display(), "no config file; using defaults");
        RawConfigFile::default()
    } else {
        return Err(LaunchgateError::ConfigError(format!(
            "config file {} not found (pass --backend to run without one)",
            config_path.display()
        )));
    };

    raw.backend.path = match backend_override {
        Some(path) => Some(path.to_path_buf()),
        None => raw
            .backend
            .path
            .map(|p| resolve_relative(&config_root_dir(config_path), p)),
    };

    Settings::try_from(raw)
}

/// Helper to resolve a default config path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Launchgate.toml")
}

/// Directory relative paths in the config are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "deploy/Launchgate.toml"),
///   that directory is used.
/// - A bare filename falls back to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn resolve_relative(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
