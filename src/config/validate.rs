// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::config::duration::parse_duration;
use crate::config::model::{RawConfigFile, ReadySection};
use crate::errors::{LaunchgateError, Result};
use crate::gate::RetrySchedule;
use crate::lifecycle::{CoordinatorOptions, SHUTDOWN_BOUND, default_quit_on_last_window_closed};
use crate::probe::{MAX_PROBE_TIMEOUT, TcpProbe};
use crate::types::{BackendSpec, CrashPolicy, ReadinessCheck};

/// Validated, typed configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendSpec,
    pub crash_policy: CrashPolicy,
    pub probe: ProbeSettings,
    pub retry: RetrySchedule,
    pub shell: ShellSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub url: Option<String>,
    pub quit_on_last_window_closed: bool,
}

impl Settings {
    pub fn probe(&self) -> TcpProbe {
        TcpProbe::new(self.probe.host.clone(), self.probe.port, self.probe.timeout)
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            quit_on_last_window_closed: self.shell.quit_on_last_window_closed,
            crash_policy: self.crash_policy,
            shutdown_timeout: self.backend.grace_period + SHUTDOWN_BOUND,
        }
    }
}

impl TryFrom<RawConfigFile> for Settings {
    type Error = LaunchgateError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let backend = validate_backend(&raw)?;
        let crash_policy = CrashPolicy {
            max_restarts: raw.backend.max_restarts,
            window: non_zero("[backend].restart_window", &raw.backend.restart_window)?,
        };
        let probe = validate_probe(&raw)?;
        let retry = validate_retry(&raw)?;
        let shell = ShellSettings {
            url: raw.shell.url.clone(),
            quit_on_last_window_closed: raw
                .shell
                .quit_on_last_window_closed
                .unwrap_or_else(default_quit_on_last_window_closed),
        };

        Ok(Settings {
            backend,
            crash_policy,
            probe,
            retry,
            shell,
        })
    }
}

fn validate_backend(cfg: &RawConfigFile) -> Result<BackendSpec> {
    let section = &cfg.backend;
    let executable: PathBuf = match &section.path {
        Some(path) if !path.as_os_str().is_empty() => path.clone(),
        _ => {
            return Err(LaunchgateError::ConfigError(
                "[backend].path is required (or pass --backend)".to_string(),
            ));
        }
    };

    let readiness = match &section.ready {
        ReadySection::Spawned => ReadinessCheck::Spawned,
        ReadySection::Stdout { pattern } => {
            let re = Regex::new(pattern).map_err(|e| {
                LaunchgateError::ConfigError(format!(
                    "[backend].ready pattern '{pattern}' is not a valid regex: {e}"
                ))
            })?;
            ReadinessCheck::Stdout(re)
        }
        ReadySection::Tcp { addr } => {
            validate_host_port(addr)?;
            ReadinessCheck::Tcp(addr.clone())
        }
    };

    Ok(BackendSpec {
        executable,
        args: section.args.clone(),
        startup_timeout: non_zero("[backend].startup_timeout", &section.startup_timeout)?,
        grace_period: parse_duration(&section.grace_period)?,
        readiness,
    })
}

fn validate_probe(cfg: &RawConfigFile) -> Result<ProbeSettings> {
    let section = &cfg.connectivity;
    if section.host.trim().is_empty() {
        return Err(LaunchgateError::ConfigError(
            "[connectivity].host must not be empty".to_string(),
        ));
    }

    let timeout = non_zero("[connectivity].timeout", &section.timeout)?;
    if timeout > MAX_PROBE_TIMEOUT {
        return Err(LaunchgateError::ConfigError(format!(
            "[connectivity].timeout must be at most {}s (got {})",
            MAX_PROBE_TIMEOUT.as_secs(),
            section.timeout
        )));
    }

    Ok(ProbeSettings {
        host: section.host.trim().to_string(),
        port: section.port,
        timeout,
    })
}

fn validate_retry(cfg: &RawConfigFile) -> Result<RetrySchedule> {
    let section = &cfg.retry;
    let interval = non_zero("[retry].interval", &section.interval)?;

    let max_interval = match &section.max_interval {
        Some(raw) => parse_duration(raw)?,
        None => interval,
    };
    if max_interval < interval {
        return Err(LaunchgateError::ConfigError(format!(
            "[retry].max_interval ({}) must not be shorter than interval ({})",
            section.max_interval.as_deref().unwrap_or_default(),
            section.interval
        )));
    }

    if !section.multiplier.is_finite() || section.multiplier < 1.0 {
        return Err(LaunchgateError::ConfigError(format!(
            "[retry].multiplier must be >= 1.0 (got {})",
            section.multiplier
        )));
    }

    Ok(RetrySchedule::with_backoff(interval, max_interval, section.multiplier))
}

fn non_zero(field: &str, raw: &str) -> Result<Duration> {
    let value = parse_duration(raw)?;
    if value.is_zero() {
        return Err(LaunchgateError::ConfigError(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(value)
}

fn validate_host_port(addr: &str) -> Result<()> {
    let valid = match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    };
    if !valid {
        return Err(LaunchgateError::ConfigError(format!(
            "[backend].ready addr '{addr}' must look like host:port"
        )));
    }
    Ok(())
}
