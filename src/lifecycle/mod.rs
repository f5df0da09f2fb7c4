// src/lifecycle/mod.rs

//! Lifecycle coordination.
//!
//! The coordinator reacts to:
//! - application start (`AppReady`)
//! - window events from the shell (`AllWindowsClosed`, `Activated`)
//! - quit requests (explicit, Ctrl-C, SIGTERM)
//! - the backend dying on its own (`BackendExited`)
//!
//! and drives probe → gate → supervisor → presenter accordingly. Restart
//! policy after a crash lives in [`policy`]; the event loop is in
//! [`coordinator`].

use std::time::Duration;

use crate::types::{CrashPolicy, HandleId};

/// Events flowing into the coordinator from the shell, signal handlers and
/// the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The host application finished initialising.
    AppReady,
    /// The application was re-activated (e.g. dock icon clicked).
    Activated,
    /// The last window was closed.
    AllWindowsClosed,
    /// Explicit quit (menu, Ctrl-C, SIGTERM).
    QuitRequested,
    /// A confirmed-running backend exited on its own.
    BackendExited { handle: HandleId, code: i32 },
}

/// Policy knobs for the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorOptions {
    /// Whether closing the last window quits the application. Platform
    /// convention: everywhere except macOS.
    pub quit_on_last_window_closed: bool,
    pub crash_policy: CrashPolicy,
    /// How long shutdown waits for the backend tree to be reaped.
    pub shutdown_timeout: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            quit_on_last_window_closed: default_quit_on_last_window_closed(),
            crash_policy: CrashPolicy::default(),
            shutdown_timeout: SHUTDOWN_BOUND,
        }
    }
}

pub fn default_quit_on_last_window_closed() -> bool {
    !cfg!(target_os = "macos")
}

/// Time allowed for reaping the backend tree after the forced kill; added to
/// the configured grace period to get `shutdown_timeout`.
pub const SHUTDOWN_BOUND: Duration = Duration::from_secs(10);

pub mod coordinator;
pub mod policy;

pub use coordinator::LifecycleCoordinator;
pub use policy::RestartBudget;
