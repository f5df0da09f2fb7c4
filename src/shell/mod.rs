// src/shell/mod.rs

//! Presentation seam.
//!
//! The graphical shell is an external collaborator: it only needs to know
//! whether to show the primary surface or the fallback one. The binary
//! ships a headless [`ConsolePresenter`] and a stdin command source that
//! stands in for window events.

pub mod console;

use std::fmt;

pub use console::{ConsolePresenter, spawn_stdin_commands};

/// Why the fallback surface is being shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackNotice {
    /// No network connectivity yet; the gate keeps retrying.
    Offline,
    /// The backend could not be started. Carries a diagnostic.
    StartupFailed(String),
    /// The backend died after startup and will not be restarted.
    BackendExited { code: i32 },
}

impl fmt::Display for FallbackNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackNotice::Offline => write!(f, "offline, waiting for a connection"),
            FallbackNotice::StartupFailed(reason) => write!(f, "backend failed to start: {reason}"),
            FallbackNotice::BackendExited { code } => {
                write!(f, "backend stopped unexpectedly (exit code {code})")
            }
        }
    }
}

/// Surface selection as seen by the coordinator.
///
/// Both calls may be repeated; presenting the surface that is already
/// showing must be harmless.
pub trait ShellPresenter: Send + Sync {
    fn present_primary(&self);
    fn present_fallback(&self, notice: &FallbackNotice);
}
