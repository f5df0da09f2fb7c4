// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [backend]
/// path = "bin/server"
/// startup_timeout = "10s"
/// ready = { kind = "stdout", pattern = "listening on" }
///
/// [connectivity]
/// host = "google.com"
///
/// [retry]
/// interval = "10s"
///
/// [shell]
/// url = "http://localhost:5173"
/// ```
///
/// Every section is optional. Durations stay strings here and are parsed
/// during validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub backend: BackendSection,

    #[serde(default)]
    pub connectivity: ConnectivitySection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub shell: ShellSection,
}

/// `[backend]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    /// Backend executable. Relative paths resolve against the directory of
    /// the config file. May be supplied with `--backend` instead.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Deadline for startup confirmation.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout: String,

    /// Time between the graceful and the forced stop signal.
    #[serde(default = "default_grace_period")]
    pub grace_period: String,

    #[serde(default)]
    pub ready: ReadySection,

    /// Restarts allowed within `restart_window` after unexpected exits.
    #[serde(default)]
    pub max_restarts: u32,

    #[serde(default = "default_restart_window")]
    pub restart_window: String,
}

fn default_startup_timeout() -> String {
    "10s".to_string()
}

fn default_grace_period() -> String {
    "3s".to_string()
}

fn default_restart_window() -> String {
    "60s".to_string()
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            path: None,
            args: Vec::new(),
            startup_timeout: default_startup_timeout(),
            grace_period: default_grace_period(),
            ready: ReadySection::default(),
            max_restarts: 0,
            restart_window: default_restart_window(),
        }
    }
}

/// `[backend].ready`: how startup is confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReadySection {
    #[default]
    Spawned,
    Stdout { pattern: String },
    Tcp { addr: String },
}

/// `[connectivity]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectivitySection {
    #[serde(default = "default_probe_host")]
    pub host: String,

    #[serde(default = "default_probe_port")]
    pub port: u16,

    #[serde(default = "default_probe_timeout")]
    pub timeout: String,
}

fn default_probe_host() -> String {
    "google.com".to_string()
}

fn default_probe_port() -> u16 {
    443
}

fn default_probe_timeout() -> String {
    "5s".to_string()
}

impl Default for ConnectivitySection {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            port: default_probe_port(),
            timeout: default_probe_timeout(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default = "default_retry_interval")]
    pub interval: String,

    /// Cap for exponential backoff. Defaults to `interval` (no growth).
    #[serde(default)]
    pub max_interval: Option<String>,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_retry_interval() -> String {
    "10s".to_string()
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            interval: default_retry_interval(),
            max_interval: None,
            multiplier: default_multiplier(),
        }
    }
}

/// `[shell]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellSection {
    /// What the primary surface shows once the backend is up.
    #[serde(default)]
    pub url: Option<String>,

    /// Defaults to the platform convention (false on macOS).
    #[serde(default)]
    pub quit_on_last_window_closed: Option<bool>,
}
