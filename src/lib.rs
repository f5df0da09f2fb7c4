// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod gate;
pub mod lifecycle;
pub mod logging;
pub mod probe;
pub mod shell;
pub mod supervisor;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::{Settings, load_settings};
use crate::gate::RetryGate;
use crate::lifecycle::{LifecycleCoordinator, LifecycleEvent};
use crate::shell::{ConsolePresenter, spawn_stdin_commands};
use crate::supervisor::BackendSupervisor;
use crate::types::ReadinessCheck;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - connectivity probe and retry gate
/// - backend supervisor
/// - console presenter and stdin commands
/// - Ctrl-C / SIGTERM handling
///
/// Returns only after the backend has been terminated.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let settings = load_settings(&config_path, args.backend.as_deref().map(Path::new))?;

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(());
    }

    // Lifecycle event channel shared by the shell, signals and supervisor.
    let (tx, rx) = mpsc::channel::<LifecycleEvent>(64);

    let supervisor = BackendSupervisor::new(settings.backend.clone(), tx.clone());
    let probe = Arc::new(settings.probe());
    let presenter = Arc::new(ConsolePresenter::new(settings.shell.url.clone()));
    let gate = RetryGate::new(settings.retry.clone());

    spawn_signal_listener(tx.clone());
    spawn_stdin_commands(tx.clone());

    tx.send(LifecycleEvent::AppReady).await?;

    let coordinator = LifecycleCoordinator::new(
        supervisor,
        gate,
        probe,
        presenter,
        rx,
        settings.coordinator_options(),
    );

    // A panic inside the coordinator unwinds through the supervisor, whose
    // process handle force-kills the backend tree on drop.
    match tokio::spawn(coordinator.run()).await {
        Ok(()) => {
            info!("launchgate exiting");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "lifecycle coordinator crashed");
            Err(anyhow!("lifecycle coordinator crashed: {e}"))
        }
    }
}

/// Ctrl-C (and SIGTERM on Unix) → `QuitRequested`.
fn spawn_signal_listener(tx: mpsc::Sender<LifecycleEvent>) {
    tokio::spawn(async move {
        wait_for_quit_signal().await;
        request_quit(&tx).await;
    });
}

/// Forward a quit to the coordinator. Returns false if it is already gone.
async fn request_quit(tx: &mpsc::Sender<LifecycleEvent>) -> bool {
    info!("quit signal received");
    if tx.send(LifecycleEvent::QuitRequested).await.is_err() {
        debug!("coordinator gone; dropping quit request");
        return false;
    }
    true
}

#[cfg(unix)]
async fn wait_for_quit_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            error!(error = %e, "failed to listen for SIGTERM");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!(error = %e, "failed to listen for Ctrl+C");
                // Fall back to SIGTERM only.
                term.recv().await;
            }
        }
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_quit_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Simple dry-run output: print the resolved settings.
fn print_dry_run(settings: &Settings) {
    let backend = &settings.backend;
    println!("launchgate dry-run");
    println!("backend:");
    println!("  path: {}", backend.executable.display());
    println!("  cwd: {}", backend.working_dir().display());
    if !backend.args.is_empty() {
        println!("  args: {:?}", backend.args);
    }
    println!("  startup_timeout: {:?}", backend.startup_timeout);
    println!("  grace_period: {:?}", backend.grace_period);
    match &backend.readiness {
        ReadinessCheck::Spawned => println!("  ready: spawned"),
        ReadinessCheck::Stdout(re) => println!("  ready: stdout matches {}", re.as_str()),
        ReadinessCheck::Tcp(addr) => println!("  ready: tcp {addr}"),
    }
    println!(
        "  max_restarts: {} per {:?}",
        settings.crash_policy.max_restarts, settings.crash_policy.window
    );
    println!("connectivity:");
    println!(
        "  probe: {}:{} (timeout {:?})",
        settings.probe.host, settings.probe.port, settings.probe.timeout
    );
    println!(
        "  retry: every {:?} (max {:?}, x{})",
        settings.retry.interval(),
        settings.retry.max_interval(),
        settings.retry.multiplier()
    );
    println!("shell:");
    if let Some(url) = &settings.shell.url {
        println!("  url: {url}");
    }
    println!(
        "  quit_on_last_window_closed: {}",
        settings.shell.quit_on_last_window_closed
    );

    debug!("dry-run complete (nothing spawned)");
}
