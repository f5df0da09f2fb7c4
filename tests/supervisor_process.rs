// tests/supervisor_process.rs
//
// Real-process tests for BackendSupervisor. They spawn small `/bin/sh`
// scripts from a temp dir.
#![cfg(unix)]

use std::error::Error;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};

use launchgate::lifecycle::LifecycleEvent;
use launchgate::supervisor::BackendSupervisor;
use launchgate::supervisor::process_tree::is_alive;
use launchgate::types::{BackendSpec, ProcessStatus, ReadinessCheck, SupervisionOutcome};
use launchgate_test_utils::{init_tracing, read_pid_file, wait_until_dead, with_timeout, write_script};

type TestResult = Result<(), Box<dyn Error>>;

fn supervisor_for(path: &Path) -> (BackendSupervisor, mpsc::Receiver<LifecycleEvent>) {
    let (tx, rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(path);
    spec.startup_timeout = Duration::from_secs(5);
    spec.grace_period = Duration::from_millis(500);
    (BackendSupervisor::new(spec, tx), rx)
}

fn started_pid(outcome: &SupervisionOutcome) -> u32 {
    match outcome {
        SupervisionOutcome::Started { pid, .. } => *pid,
        other => panic!("expected Started, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_binary_is_reported_without_spawning() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let (mut sup, _rx) = supervisor_for(&dir.path().join("does-not-exist"));

    let outcome = sup.spawn().await;

    assert!(matches!(outcome, SupervisionOutcome::BinaryMissing(_)));
    assert!(sup.current().is_none(), "no handle may exist after BinaryMissing");
    Ok(())
}

#[tokio::test]
async fn non_executable_file_counts_as_missing() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let path = dir.path().join("server");
    std::fs::write(&path, "#!/bin/sh\nexit 0\n")?;

    let (mut sup, _rx) = supervisor_for(&path);

    assert!(matches!(sup.spawn().await, SupervisionOutcome::BinaryMissing(_)));
    assert!(sup.current().is_none());
    Ok(())
}

#[tokio::test]
async fn terminate_twice_is_harmless_and_process_is_gone() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(dir.path(), "server", "exec sleep 30");
    let (mut sup, _rx) = supervisor_for(&script);

    let pid = started_pid(&sup.spawn().await);
    assert!(is_alive(pid));
    assert_eq!(sup.current().map(|h| h.status()), Some(ProcessStatus::Running));

    with_timeout(sup.terminate()).await;
    assert!(!is_alive(pid), "backend must be reaped after the first terminate");
    assert!(sup.current().is_none());

    with_timeout(sup.terminate()).await;
    assert!(sup.current().is_none());
    Ok(())
}

#[tokio::test]
async fn respawn_after_terminate_gets_a_fresh_handle() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(dir.path(), "server", "exec sleep 30");
    let (mut sup, _rx) = supervisor_for(&script);

    let first = sup.spawn().await;
    let first_pid = started_pid(&first);
    sup.terminate().await;

    let second = sup.spawn().await;
    let second_pid = started_pid(&second);

    match (&first, &second) {
        (
            SupervisionOutcome::Started { handle: a, .. },
            SupervisionOutcome::Started { handle: b, .. },
        ) => assert_ne!(a, b),
        _ => unreachable!(),
    }
    assert!(!is_alive(first_pid));
    assert!(is_alive(second_pid));

    sup.terminate().await;
    assert!(!is_alive(second_pid));
    Ok(())
}

#[tokio::test]
async fn spawning_again_terminates_the_previous_instance() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(dir.path(), "server", "exec sleep 30");
    let (mut sup, _rx) = supervisor_for(&script);

    let first_pid = started_pid(&sup.spawn().await);
    let second_pid = started_pid(&sup.spawn().await);

    assert!(!is_alive(first_pid), "at most one backend may be alive");
    assert!(is_alive(second_pid));

    sup.terminate().await;
    Ok(())
}

#[tokio::test]
async fn startup_timeout_kills_the_nascent_process() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let pid_file = dir.path().join("server.pid");
    let script = write_script(
        dir.path(),
        "server",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );

    let (tx, _rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.startup_timeout = Duration::from_millis(700);
    spec.readiness = ReadinessCheck::Stdout(Regex::new("never printed")?);
    let mut sup = BackendSupervisor::new(spec, tx);

    let started = Instant::now();
    let outcome = sup.spawn().await;

    assert_eq!(
        outcome,
        SupervisionOutcome::StartupTimeout(Duration::from_millis(700))
    );
    assert!(started.elapsed() >= Duration::from_millis(700));
    assert!(started.elapsed() < Duration::from_secs(5));

    let pid = read_pid_file(&pid_file).await;
    assert!(!is_alive(pid), "timed-out backend must not be left running");
    assert!(sup.current().is_none());
    Ok(())
}

#[tokio::test]
async fn stdout_pattern_confirms_startup() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(
        dir.path(),
        "server",
        "echo booting\nsleep 0.2\necho 'listening on 8080'\nexec sleep 30",
    );

    let (tx, _rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.readiness = ReadinessCheck::Stdout(Regex::new("listening on")?);
    let mut sup = BackendSupervisor::new(spec, tx);

    let started = Instant::now();
    let pid = started_pid(&sup.spawn().await);
    assert!(started.elapsed() >= Duration::from_millis(200));

    sup.terminate().await;
    assert!(!is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn tcp_readiness_waits_for_a_listener() -> TestResult {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let dir = TempDir::new()?;
    let script = write_script(dir.path(), "server", "exec sleep 30");

    let (tx, _rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.readiness = ReadinessCheck::Tcp(addr.to_string());
    let mut sup = BackendSupervisor::new(spec, tx);

    let pid = started_pid(&sup.spawn().await);
    sup.terminate().await;
    assert!(!is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn exit_during_startup_is_a_spawn_error() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(dir.path(), "server", "echo 'bad config' >&2\nexit 3");

    let (tx, _rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.readiness = ReadinessCheck::Stdout(Regex::new("ready")?);
    let mut sup = BackendSupervisor::new(spec, tx);

    match sup.spawn().await {
        SupervisionOutcome::SpawnError(reason) => assert!(reason.contains("code 3"), "{reason}"),
        other => panic!("expected SpawnError, got {other:?}"),
    }
    assert!(sup.current().is_none());
    Ok(())
}

#[tokio::test]
async fn terminate_kills_the_whole_process_tree() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let helper_pid_file = dir.path().join("helper.pid");
    let script = write_script(
        dir.path(),
        "server",
        &format!(
            "sleep 60 &\necho $! > '{}'\necho ready\nwait",
            helper_pid_file.display()
        ),
    );

    let (tx, _rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.readiness = ReadinessCheck::Stdout(Regex::new("ready")?);
    spec.grace_period = Duration::from_millis(300);
    let mut sup = BackendSupervisor::new(spec, tx);

    let pid = started_pid(&sup.spawn().await);
    let helper = read_pid_file(&helper_pid_file).await;
    assert!(is_alive(helper));

    sup.terminate().await;

    assert!(!is_alive(pid));
    assert!(wait_until_dead(helper).await, "forked helper survived termination");
    Ok(())
}

#[tokio::test]
async fn backend_ignoring_sigterm_is_force_killed_after_grace() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(
        dir.path(),
        "server",
        "trap '' TERM\necho ready\nwhile true; do sleep 1; done",
    );

    let (tx, _rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.readiness = ReadinessCheck::Stdout(Regex::new("ready")?);
    spec.grace_period = Duration::from_millis(300);
    let mut sup = BackendSupervisor::new(spec, tx);

    let pid = started_pid(&sup.spawn().await);

    let started = Instant::now();
    with_timeout(sup.terminate()).await;

    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(!is_alive(pid));
    Ok(())
}

#[tokio::test]
async fn unexpected_exit_is_published_once_running() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let script = write_script(dir.path(), "server", "echo ready\nsleep 0.3\nexit 7");

    let (tx, mut rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.readiness = ReadinessCheck::Stdout(Regex::new("ready")?);
    let mut sup = BackendSupervisor::new(spec, tx);

    let handle = match sup.spawn().await {
        SupervisionOutcome::Started { handle, .. } => handle,
        other => panic!("expected Started, got {other:?}"),
    };

    let event = timeout(Duration::from_secs(5), rx.recv()).await?;
    assert_eq!(event, Some(LifecycleEvent::BackendExited { handle, code: 7 }));
    assert_eq!(
        sup.current().map(|h| h.status()),
        Some(ProcessStatus::Exited(7))
    );

    // Clearing an already-exited handle is fine.
    sup.terminate().await;
    assert!(sup.current().is_none());
    Ok(())
}

#[tokio::test]
async fn backend_runs_from_its_own_directory() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let bin_dir = dir.path().join("bin");
    std::fs::create_dir(&bin_dir)?;
    let cwd_file = bin_dir.join("cwd.txt");
    let script = write_script(&bin_dir, "server", "pwd -P > cwd.txt\necho ready\nexec sleep 30");

    let (tx, _rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.readiness = ReadinessCheck::Stdout(Regex::new("ready")?);
    let mut sup = BackendSupervisor::new(spec, tx);

    started_pid(&sup.spawn().await);
    sup.terminate().await;

    let cwd = std::fs::read_to_string(&cwd_file)?;
    assert_eq!(Path::new(cwd.trim()), bin_dir.canonicalize()?);
    Ok(())
}

#[tokio::test]
async fn dropping_spawn_mid_startup_leaves_a_killable_handle() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let pid_file = dir.path().join("server.pid");
    let script = write_script(
        dir.path(),
        "server",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );

    let (tx, _rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.startup_timeout = Duration::from_secs(30);
    spec.readiness = ReadinessCheck::Stdout(Regex::new("never printed")?);
    let mut sup = BackendSupervisor::new(spec, tx);

    // Cancel the startup wait well before its deadline.
    let cancelled = timeout(Duration::from_millis(500), sup.spawn()).await;
    assert!(cancelled.is_err());
    assert_eq!(sup.current().map(|h| h.status()), Some(ProcessStatus::Starting));

    let pid = read_pid_file(&pid_file).await;
    let started = Instant::now();
    sup.terminate().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!is_alive(pid));
    Ok(())
}

/// A backend still waiting for confirmation is force-killed at once, even
/// if it ignores SIGTERM and the grace period is long.
#[tokio::test]
async fn terminate_during_startup_skips_the_grace_period() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let pid_file = dir.path().join("server.pid");
    let script = write_script(
        dir.path(),
        "server",
        &format!(
            "trap '' TERM\necho $$ > '{}'\nwhile true; do sleep 1; done",
            pid_file.display()
        ),
    );

    let (tx, _rx) = mpsc::channel(16);
    let mut spec = BackendSpec::new(&script);
    spec.startup_timeout = Duration::from_secs(30);
    spec.grace_period = Duration::from_secs(3);
    spec.readiness = ReadinessCheck::Stdout(Regex::new("never printed")?);
    let mut sup = BackendSupervisor::new(spec, tx);

    let cancelled = timeout(Duration::from_millis(300), sup.spawn()).await;
    assert!(cancelled.is_err());
    let pid = read_pid_file(&pid_file).await;

    let started = Instant::now();
    with_timeout(sup.terminate()).await;

    assert!(
        started.elapsed() < Duration::from_millis(1500),
        "terminate waited {:?}",
        started.elapsed()
    );
    assert!(!is_alive(pid));
    assert!(sup.current().is_none());
    Ok(())
}
