// src/supervisor/monitor.rs

//! Per-process monitor task.
//!
//! The monitor owns the `Child`. It waits for either the process to exit on
//! its own, or for a stop request from the supervisor, and publishes the
//! final status on the handle's watch channel.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::lifecycle::LifecycleEvent;
use crate::types::{HandleId, ProcessStatus};

use super::process_tree::{TreeSignal, signal_tree};

/// Sent by the supervisor to end a process.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StopRequest {
    /// Time between the graceful and the forced signal. Zero skips the
    /// graceful step.
    pub grace: Duration,
}

pub(crate) struct MonitorContext {
    pub handle: HandleId,
    pub pid: u32,
    pub status: Arc<watch::Sender<ProcessStatus>>,
    pub events: mpsc::Sender<LifecycleEvent>,
}

/// Watch a running backend until it exits or is told to stop.
///
/// - If the process exits on its own after it was confirmed `Running`, a
///   `BackendExited` event is sent to the coordinator.
/// - If it exits while still `Starting`, only the status is published; the
///   pending `spawn` call reports the failure.
/// - A dropped stop sender is treated as an immediate forced stop.
pub(crate) async fn monitor_process(
    mut child: Child,
    ctx: MonitorContext,
    mut stop_rx: oneshot::Receiver<StopRequest>,
) {
    let MonitorContext {
        handle,
        pid,
        status,
        events,
    } = ctx;

    tokio::select! {
        wait_res = child.wait() => {
            let exit = match wait_res {
                Ok(exit) => exit,
                Err(e) => {
                    error!(handle = %handle, pid, error = %e, "failed to wait on backend process");
                    // Make sure nothing is left running before giving up on it.
                    force_kill(&mut child, pid).await;
                    status.send_replace(ProcessStatus::Failed(e.to_string()));
                    return;
                }
            };

            let code = exit_code(&exit);

            // The leader is gone but helpers it forked may still hold the
            // group open.
            if let Err(e) = signal_tree(pid, TreeSignal::Force) {
                warn!(handle = %handle, pid, error = %e, "failed to clear leftover backend helpers");
            }

            let was_running = publish_exit(&status, code);

            if was_running {
                error!(handle = %handle, pid, exit_code = code, "backend exited unexpectedly");
                if events
                    .send(LifecycleEvent::BackendExited { handle, code })
                    .await
                    .is_err()
                {
                    debug!(handle = %handle, "coordinator gone; dropping exit event");
                }
            } else {
                info!(handle = %handle, pid, exit_code = code, "backend exited during startup");
            }
        }

        stop = &mut stop_rx => {
            let grace = match stop {
                Ok(request) => request.grace,
                Err(_) => {
                    debug!(handle = %handle, pid, "process handle dropped; forcing stop");
                    Duration::ZERO
                }
            };
            let code = terminate_tree(&mut child, pid, grace).await;
            info!(handle = %handle, pid, exit_code = code, "backend process tree terminated");
            status.send_replace(ProcessStatus::Exited(code));
        }
    }
}

/// Record `Exited(code)` and report whether the instance had been confirmed
/// `Running`. Read and write happen under one lock so a concurrent startup
/// confirmation sees either the old status or the exit, never neither.
pub(crate) fn publish_exit(status: &watch::Sender<ProcessStatus>, code: i32) -> bool {
    let mut was_running = false;
    status.send_modify(|s| {
        was_running = *s == ProcessStatus::Running;
        *s = ProcessStatus::Exited(code);
    });
    was_running
}

/// Graceful signal, bounded wait, then an unconditional forced kill of the
/// whole tree. Returns the leader's exit code.
async fn terminate_tree(child: &mut Child, pid: u32, grace: Duration) -> i32 {
    let mut exited = None;

    if !grace.is_zero() {
        if let Err(e) = signal_tree(pid, TreeSignal::Graceful) {
            warn!(pid, error = %e, "graceful stop signal failed");
        }
        match timeout(grace, child.wait()).await {
            Ok(Ok(exit)) => exited = Some(exit),
            Ok(Err(e)) => warn!(pid, error = %e, "error while waiting for graceful exit"),
            Err(_) => info!(
                pid,
                grace_ms = grace.as_millis() as u64,
                "backend ignored graceful stop; escalating"
            ),
        }
    }

    if let Some(exit) = exited {
        if let Err(e) = signal_tree(pid, TreeSignal::Force) {
            warn!(pid, error = %e, "failed to force-kill remaining backend helpers");
        }
        return exit_code(&exit);
    }

    force_kill(child, pid).await
}

async fn force_kill(child: &mut Child, pid: u32) -> i32 {
    if let Err(e) = signal_tree(pid, TreeSignal::Force) {
        warn!(pid, error = %e, "forced tree kill failed; killing leader only");
    }
    if let Err(e) = child.start_kill() {
        debug!(pid, error = %e, "leader already gone");
    }
    match child.wait().await {
        Ok(exit) => exit_code(&exit),
        Err(e) => {
            warn!(pid, error = %e, "failed to reap backend after kill");
            -1
        }
    }
}

fn exit_code(exit: &ExitStatus) -> i32 {
    exit.code().unwrap_or(-1)
}
