pub mod fakes;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

pub use fakes::{BackendCall, FakeBackend, FakeBackendState, Presentation, RecordingPresenter, ScriptedProbe};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// Poll `condition` every 10ms until it holds; panics after ~100s of
/// (possibly paused) Tokio time.
pub async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true: {what}");
}

/// Write an executable `#!/bin/sh` script into `dir` and return its path.
#[cfg(unix)]
pub fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("writing test script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("making script executable");
    path
}

/// Read a pid a test script wrote with `echo $$ > file`, waiting for it to
/// appear.
pub async fn read_pid_file(path: &std::path::Path) -> u32 {
    for _ in 0..500 {
        if let Ok(contents) = std::fs::read_to_string(path) {
            if let Ok(pid) = contents.trim().parse() {
                return pid;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pid file {} never appeared", path.display());
}

/// Wait for `pid` to die. Orphaned grandchildren are reaped by init
/// asynchronously (or never, in some containers), so this polls and counts
/// a zombie as dead.
#[cfg(unix)]
pub async fn wait_until_dead(pid: u32) -> bool {
    for _ in 0..300 {
        if !launchgate::supervisor::process_tree::is_alive(pid) || is_zombie(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    // Field 3 of /proc/<pid>/stat, after the parenthesised command name.
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            let rest = stat.rsplit_once(')')?.1;
            rest.split_whitespace().next().map(|state| state == "Z")
        })
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}
