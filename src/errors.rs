// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Process failures (missing binary, spawn errors, startup timeouts) are not
//! errors in this sense: the supervisor reports them as a
//! [`SupervisionOutcome`](crate::types::SupervisionOutcome).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchgateError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LaunchgateError>;
