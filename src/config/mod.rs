// src/config/mod.rs

//! Configuration loading and validation for launchgate.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into typed [`Settings`] (`validate.rs`).
//! - Parse human-friendly durations such as `"10s"` (`duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_from_path, load_settings};
pub use model::{
    BackendSection, ConnectivitySection, RawConfigFile, ReadySection, RetrySection, ShellSection,
};
pub use validate::{ProbeSettings, Settings, ShellSettings};
