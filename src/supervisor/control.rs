// src/supervisor/control.rs

//! Pluggable backend control abstraction.
//!
//! The coordinator talks to a `BackendControl` instead of the concrete
//! supervisor. Production uses [`BackendSupervisor`]; tests can provide an
//! implementation that scripts spawn outcomes without creating processes.

use std::future::Future;
use std::pin::Pin;

use crate::types::{HandleId, SupervisionOutcome};

use super::BackendSupervisor;

/// What the coordinator needs from a supervisor.
pub trait BackendControl: Send {
    /// Spawn the backend and wait for startup confirmation.
    ///
    /// Must be cancel-safe: if the future is dropped, a following `stop`
    /// still tears down whatever was started.
    fn start(&mut self) -> Pin<Box<dyn Future<Output = SupervisionOutcome> + Send + '_>>;

    /// Terminate the backend process tree. Idempotent.
    fn stop(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Id of the live instance, if any.
    fn current_handle(&self) -> Option<HandleId>;
}

impl BackendControl for BackendSupervisor {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = SupervisionOutcome> + Send + '_>> {
        Box::pin(self.spawn())
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.terminate())
    }

    fn current_handle(&self) -> Option<HandleId> {
        self.current().map(|h| h.id())
    }
}
