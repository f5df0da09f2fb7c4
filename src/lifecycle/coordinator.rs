// src/lifecycle/coordinator.rs

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::gate::RetryGate;
use crate::probe::ConnectivityProbe;
use crate::shell::{FallbackNotice, ShellPresenter};
use crate::supervisor::BackendControl;
use crate::types::SupervisionOutcome;

use super::policy::RestartBudget;
use super::{CoordinatorOptions, LifecycleEvent};

/// Whether the event loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// How an event arriving mid-bring-up affects the sequence in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
    /// Keep going; the event is irrelevant right now.
    Ignore,
    /// Stop the sequence but keep the application alive.
    Abort,
    /// Stop the sequence and shut down.
    Shutdown,
}

/// Top-level driver: probe → gate → supervisor → presenter.
///
/// Runs on a single task and owns every piece of mutable state, so no
/// locking is needed. The backend is always terminated before
/// [`run`](Self::run) returns.
pub struct LifecycleCoordinator<B: BackendControl> {
    backend: B,
    gate: RetryGate,
    probe: Arc<dyn ConnectivityProbe>,
    presenter: Arc<dyn ShellPresenter>,
    events: mpsc::Receiver<LifecycleEvent>,
    options: CoordinatorOptions,
    restarts: RestartBudget,
    /// True while some surface (fallback or primary) is being driven.
    surface_active: bool,
}

impl<B: BackendControl> std::fmt::Debug for LifecycleCoordinator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("gate", &self.gate)
            .field("options", &self.options)
            .field("surface_active", &self.surface_active)
            .finish_non_exhaustive()
    }
}

impl<B: BackendControl> LifecycleCoordinator<B> {
    pub fn new(
        backend: B,
        gate: RetryGate,
        probe: Arc<dyn ConnectivityProbe>,
        presenter: Arc<dyn ShellPresenter>,
        events: mpsc::Receiver<LifecycleEvent>,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            backend,
            gate,
            probe,
            presenter,
            events,
            restarts: RestartBudget::new(options.crash_policy),
            options,
            surface_active: false,
        }
    }

    /// Main event loop.
    ///
    /// Returns once a quit condition is reached or every event sender is
    /// gone, after the backend has been terminated.
    pub async fn run(mut self) {
        info!("lifecycle coordinator started");

        loop {
            let Some(event) = self.events.recv().await else {
                info!("lifecycle event channel closed");
                break;
            };

            debug!(?event, "coordinator received event");

            if self.handle_event(event).await == Flow::Exit {
                break;
            }
        }

        self.shutdown().await;
    }

    async fn handle_event(&mut self, event: LifecycleEvent) -> Flow {
        match event {
            LifecycleEvent::AppReady => self.bring_up().await,
            LifecycleEvent::Activated => {
                if self.surface_active {
                    info!("activation with a surface already active; nothing to do");
                    return Flow::Continue;
                }
                info!("reactivated without a surface; restarting startup sequence");
                self.bring_up().await
            }
            LifecycleEvent::AllWindowsClosed => {
                self.surface_active = false;
                if self.options.quit_on_last_window_closed {
                    info!("all windows closed; quitting");
                    Flow::Exit
                } else {
                    info!("all windows closed; staying alive until reactivated or quit");
                    Flow::Continue
                }
            }
            LifecycleEvent::QuitRequested => {
                info!("quit requested");
                Flow::Exit
            }
            LifecycleEvent::BackendExited { handle, code } => {
                if self.backend.current_handle() != Some(handle) {
                    debug!(handle = %handle, "exit event for a previous backend instance; ignoring");
                    return Flow::Continue;
                }
                self.on_backend_crash(code).await
            }
        }
    }

    /// Connectivity gate, then spawn, then present.
    ///
    /// Prior state is never trusted: any tracked backend is terminated
    /// first. Quit and close events are honoured while the sequence is in
    /// flight; dropping the spawn future leaves the half-started process to
    /// the following `stop`.
    async fn bring_up(&mut self) -> Flow {
        self.surface_active = true;
        self.backend.stop().await;

        {
            let gate = self.gate.run(self.probe.as_ref(), self.presenter.as_ref());
            tokio::pin!(gate);

            loop {
                tokio::select! {
                    _ = &mut gate => break,
                    event = self.events.recv() => {
                        match classify_interruption(event, &self.options) {
                            Interruption::Ignore => continue,
                            Interruption::Abort => {
                                self.surface_active = false;
                                return Flow::Continue;
                            }
                            Interruption::Shutdown => return Flow::Exit,
                        }
                    }
                }
            }
        }

        let outcome = {
            let start = self.backend.start();
            tokio::pin!(start);

            loop {
                tokio::select! {
                    outcome = &mut start => break Some(outcome),
                    event = self.events.recv() => {
                        match classify_interruption(event, &self.options) {
                            Interruption::Ignore => continue,
                            Interruption::Abort => {
                                info!("startup aborted; terminating half-started backend");
                                self.surface_active = false;
                                break None;
                            }
                            Interruption::Shutdown => {
                                info!("shutdown requested during backend startup");
                                return Flow::Exit;
                            }
                        }
                    }
                }
            }
        };

        let Some(outcome) = outcome else {
            self.backend.stop().await;
            return Flow::Continue;
        };

        match outcome {
            SupervisionOutcome::Started { handle, pid } => {
                info!(handle = %handle, pid, "backend ready; presenting primary surface");
                self.presenter.present_primary();
            }
            failure => {
                error!(outcome = %failure, "backend startup failed");
                self.presenter
                    .present_fallback(&FallbackNotice::StartupFailed(failure.to_string()));
            }
        }
        Flow::Continue
    }

    async fn on_backend_crash(&mut self, code: i32) -> Flow {
        // Clears the handle and sweeps any helpers the backend left behind.
        self.backend.stop().await;

        if self.restarts.try_restart(Instant::now()) {
            warn!(
                exit_code = code,
                restarts = self.restarts.used(),
                max_restarts = self.options.crash_policy.max_restarts,
                "backend crashed; restarting"
            );
            return self.bring_up().await;
        }

        error!(exit_code = code, "backend crashed; restart budget exhausted or disabled");
        self.presenter
            .present_fallback(&FallbackNotice::BackendExited { code });
        Flow::Continue
    }

    async fn shutdown(&mut self) {
        info!("shutting down; terminating backend");
        let limit = self.options.shutdown_timeout;
        if timeout(limit, self.backend.stop()).await.is_err() {
            error!(
                timeout_ms = limit.as_millis() as u64,
                "backend termination did not finish in time"
            );
        }
        info!("shutdown complete");
    }
}

/// Map an event that arrives while a bring-up sequence is running.
fn classify_interruption(
    event: Option<LifecycleEvent>,
    options: &CoordinatorOptions,
) -> Interruption {
    match event {
        None => Interruption::Shutdown,
        Some(LifecycleEvent::QuitRequested) => Interruption::Shutdown,
        Some(LifecycleEvent::AllWindowsClosed) => {
            if options.quit_on_last_window_closed {
                Interruption::Shutdown
            } else {
                Interruption::Abort
            }
        }
        Some(other) => {
            info!(event = ?other, "startup sequence in progress; event has no effect");
            Interruption::Ignore
        }
    }
}
