// src/supervisor/mod.rs

//! Backend process supervision.
//!
//! [`BackendSupervisor`] is the only owner of the live [`ProcessHandle`].
//! Everything else learns about the backend through the returned
//! [`SupervisionOutcome`], the handle's status watch channel, or
//! [`LifecycleEvent::BackendExited`](crate::lifecycle::LifecycleEvent).
//!
//! - [`control`] defines the `BackendControl` seam the coordinator drives.
//! - [`monitor`] owns each `Child` and turns exits into status updates.
//! - [`output`] drains stdout/stderr into the logging sink.
//! - [`process_tree`] signals the backend together with its descendants.

pub mod control;
mod monitor;
mod output;
pub mod process_tree;

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::{Notify, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::lifecycle::LifecycleEvent;
use crate::probe::tcp_reachable;
use crate::types::{BackendSpec, HandleId, ProcessStatus, ReadinessCheck, SupervisionOutcome};

pub use control::BackendControl;

use monitor::{MonitorContext, StopRequest, monitor_process};
use output::{ReadyMatcher, forward_output};
use process_tree::{TreeSignal, signal_tree};

/// Extra time allowed for the monitor to reap the tree after the forced
/// signal has been sent.
const REAP_BOUND: Duration = Duration::from_secs(5);

const TCP_READY_POLL: Duration = Duration::from_millis(250);
const TCP_READY_ATTEMPT: Duration = Duration::from_millis(800);

/// A spawned backend instance.
///
/// Dropping a handle whose process is still alive force-kills the process
/// tree, so unwinding through the supervisor cannot orphan the backend.
#[derive(Debug)]
pub struct ProcessHandle {
    id: HandleId,
    pid: u32,
    started_at: Instant,
    status: Arc<watch::Sender<ProcessStatus>>,
    stop: Option<oneshot::Sender<StopRequest>>,
    monitor: Option<JoinHandle<()>>,
}

impl ProcessHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn status(&self) -> ProcessStatus {
        self.status.borrow().clone()
    }

    /// Follow status transitions of this instance.
    pub fn subscribe(&self) -> watch::Receiver<ProcessStatus> {
        self.status.subscribe()
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.status.borrow().is_terminal() {
            return;
        }
        if let Err(e) = signal_tree(self.pid, TreeSignal::Force) {
            warn!(handle = %self.id, pid = self.pid, error = %e, "failed to kill backend on handle drop");
        }
    }
}

/// Spawns, watches, and tears down the backend process.
#[derive(Debug)]
pub struct BackendSupervisor {
    spec: BackendSpec,
    events: mpsc::Sender<LifecycleEvent>,
    current: Option<ProcessHandle>,
    next_id: u64,
}

impl BackendSupervisor {
    /// `events` receives `BackendExited` when a running backend dies on its
    /// own.
    pub fn new(spec: BackendSpec, events: mpsc::Sender<LifecycleEvent>) -> Self {
        Self {
            spec,
            events,
            current: None,
            next_id: 1,
        }
    }

    pub fn spec(&self) -> &BackendSpec {
        &self.spec
    }

    /// The live handle, if any.
    pub fn current(&self) -> Option<&ProcessHandle> {
        self.current.as_ref()
    }

    /// Spawn the configured backend. See [`spawn_with`](Self::spawn_with).
    pub async fn spawn(&mut self) -> SupervisionOutcome {
        let spec = self.spec.clone();
        self.spawn_with(&spec).await
    }

    /// Spawn `spec.executable` from its own directory and wait for startup
    /// confirmation.
    ///
    /// - A previously tracked instance is terminated first, so at most one
    ///   backend is ever alive.
    /// - A missing or non-executable binary yields `BinaryMissing` without
    ///   touching the OS process table.
    /// - If confirmation does not arrive within `spec.startup_timeout`, the
    ///   nascent tree is force-killed and `StartupTimeout` is returned.
    ///
    /// Dropping the returned future mid-startup leaves the handle in place
    /// with status `Starting`; a following [`terminate`](Self::terminate)
    /// kills it without waiting out the deadline.
    pub async fn spawn_with(&mut self, spec: &BackendSpec) -> SupervisionOutcome {
        if self.current.is_some() {
            debug!("previous backend instance still tracked; terminating before respawn");
            self.terminate().await;
        }

        let executable = match resolve_executable(&spec.executable) {
            Some(path) => path,
            None => {
                warn!(path = %spec.executable.display(), "backend executable missing or not executable");
                return SupervisionOutcome::BinaryMissing(spec.executable.clone());
            }
        };
        let working_dir = match executable.parent() {
            Some(dir) => dir.to_path_buf(),
            None => spec.working_dir().to_path_buf(),
        };

        let mut cmd = Command::new(&executable);
        cmd.args(&spec.args)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // New process group: the group id equals the backend pid, which is
        // what `signal_tree` addresses.
        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        cmd.creation_flags(0x0000_0200); // CREATE_NEW_PROCESS_GROUP

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(path = %executable.display(), error = %e, "failed to spawn backend");
                return SupervisionOutcome::SpawnError(format!("{}: {e}", executable.display()));
            }
        };

        let Some(pid) = child.id() else {
            return SupervisionOutcome::SpawnError(
                "backend exited before its pid could be read".to_string(),
            );
        };

        let id = HandleId(self.next_id);
        self.next_id += 1;

        let (status_tx, status_rx) = watch::channel(ProcessStatus::Starting);
        let status = Arc::new(status_tx);

        let ready = match &spec.readiness {
            ReadinessCheck::Stdout(pattern) => Some(ReadyMatcher {
                pattern: pattern.clone(),
                notify: Arc::new(Notify::new()),
            }),
            _ => None,
        };
        let ready_notify = ready.as_ref().map(|m| Arc::clone(&m.notify));
        forward_output(id, pid, child.stdout.take(), child.stderr.take(), ready);

        let (stop_tx, stop_rx) = oneshot::channel();
        let ctx = MonitorContext {
            handle: id,
            pid,
            status: Arc::clone(&status),
            events: self.events.clone(),
        };
        let monitor = tokio::spawn(monitor_process(child, ctx, stop_rx));

        self.current = Some(ProcessHandle {
            id,
            pid,
            started_at: Instant::now(),
            status: Arc::clone(&status),
            stop: Some(stop_tx),
            monitor: Some(monitor),
        });

        info!(
            handle = %id,
            pid,
            exe = %executable.display(),
            cwd = %working_dir.display(),
            "backend spawned; awaiting startup confirmation"
        );

        let confirmation = wait_for_startup(&spec.readiness, status_rx, ready_notify);
        match timeout(spec.startup_timeout, confirmation).await {
            Ok(Ok(())) => match confirm_running(&status) {
                Ok(()) => {
                    info!(handle = %id, pid, "backend startup confirmed");
                    SupervisionOutcome::Started { handle: id, pid }
                }
                Err(reason) => {
                    warn!(handle = %id, pid, %reason, "backend exited as startup was confirmed");
                    self.terminate_with_grace(Duration::ZERO).await;
                    SupervisionOutcome::SpawnError(reason)
                }
            },
            Ok(Err(reason)) => {
                warn!(handle = %id, pid, %reason, "backend failed during startup");
                self.terminate_with_grace(Duration::ZERO).await;
                SupervisionOutcome::SpawnError(reason)
            }
            Err(_) => {
                warn!(
                    handle = %id,
                    pid,
                    timeout_ms = spec.startup_timeout.as_millis() as u64,
                    "backend did not confirm startup in time; killing it"
                );
                self.terminate_with_grace(Duration::ZERO).await;
                SupervisionOutcome::StartupTimeout(spec.startup_timeout)
            }
        }
    }

    /// Terminate the backend process tree: graceful signal, grace period,
    /// then a forced kill. Returns once the leader has been reaped.
    ///
    /// A backend that never confirmed startup is force-killed right away.
    /// Idempotent: without a live handle this returns immediately.
    pub async fn terminate(&mut self) {
        let grace = match self.current.as_ref().map(ProcessHandle::status) {
            Some(ProcessStatus::Starting) => {
                debug!("backend still starting; skipping graceful stop");
                Duration::ZERO
            }
            _ => self.spec.grace_period,
        };
        self.terminate_with_grace(grace).await;
    }

    async fn terminate_with_grace(&mut self, grace: Duration) {
        let Some(mut handle) = self.current.take() else {
            debug!("terminate: no backend instance tracked");
            return;
        };

        info!(
            handle = %handle.id,
            pid = handle.pid,
            status = ?handle.status(),
            grace_ms = grace.as_millis() as u64,
            "terminating backend"
        );

        if let Some(stop) = handle.stop.take() {
            if stop.send(StopRequest { grace }).is_err() {
                debug!(handle = %handle.id, "monitor already finished");
            }
        }

        if let Some(monitor) = handle.monitor.take() {
            match timeout(grace + REAP_BOUND, monitor).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(handle = %handle.id, error = %e, "backend monitor task failed"),
                Err(_) => {
                    warn!(handle = %handle.id, pid = handle.pid, "backend not reaped in time; forcing");
                    if let Err(e) = signal_tree(handle.pid, TreeSignal::Force) {
                        warn!(handle = %handle.id, error = %e, "forced kill failed");
                    }
                }
            }
        }
        // `handle` drops here; its Drop impl covers the not-reaped case.
    }
}

/// Move a confirmed instance from `Starting` to `Running`.
///
/// The monitor publishes exits through the same channel, so whichever side
/// writes first wins: an exit already recorded turns the confirmation into a
/// startup failure.
fn confirm_running(status: &watch::Sender<ProcessStatus>) -> Result<(), String> {
    let promoted = status.send_if_modified(|s| {
        if *s == ProcessStatus::Starting {
            *s = ProcessStatus::Running;
            true
        } else {
            false
        }
    });
    if promoted {
        return Ok(());
    }
    match &*status.borrow() {
        ProcessStatus::Exited(code) => Err(format!("backend exited during startup with code {code}")),
        ProcessStatus::Failed(e) => Err(format!("backend failed during startup: {e}")),
        other => Err(format!("backend left startup in unexpected state {other:?}")),
    }
}

/// Canonical path of `path` if it names an executable regular file.
fn resolve_executable(path: &Path) -> Option<std::path::PathBuf> {
    let canonical = std::fs::canonicalize(path).ok()?;
    let meta = std::fs::metadata(&canonical).ok()?;
    if !meta.is_file() {
        return None;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return None;
        }
    }
    Some(canonical)
}

/// Resolve once the backend is confirmed up, or fail with a reason if it
/// exits first. The caller applies the deadline.
async fn wait_for_startup(
    readiness: &ReadinessCheck,
    mut status: watch::Receiver<ProcessStatus>,
    ready: Option<Arc<Notify>>,
) -> Result<(), String> {
    let exited = async {
        status
            .wait_for(ProcessStatus::is_terminal)
            .await
            .map(|s| s.clone())
    };

    let confirmed = async {
        match (readiness, ready) {
            (ReadinessCheck::Stdout(_), Some(notify)) => notify.notified().await,
            (ReadinessCheck::Tcp(addr), _) => loop {
                if tcp_reachable(addr, TCP_READY_ATTEMPT).await {
                    break;
                }
                sleep(TCP_READY_POLL).await;
            },
            _ => {}
        }
    };

    tokio::select! {
        biased;

        exited = exited => match exited {
            Ok(ProcessStatus::Exited(code)) => {
                Err(format!("backend exited during startup with code {code}"))
            }
            Ok(ProcessStatus::Failed(e)) => Err(format!("backend failed during startup: {e}")),
            Ok(other) => Err(format!("backend left startup in unexpected state {other:?}")),
            Err(_) => Err("backend monitor stopped during startup".to_string()),
        },
        () = confirmed => Ok(()),
    }
}
