use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use regex::Regex;

/// Result of a single reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        matches!(self, Connectivity::Online)
    }
}

/// A connectivity reading as observed by the gate.
///
/// Readings are never persisted. `seq` grows monotonically per observer, so
/// a reading can be discarded once a fresher one has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub connectivity: Connectivity,
    pub checked_at: Instant,
    pub seq: u64,
}

impl ConnectivityState {
    pub fn new(connectivity: Connectivity, seq: u64) -> Self {
        Self {
            connectivity,
            checked_at: Instant::now(),
            seq,
        }
    }

    /// True if `self` is a fresher reading than `other`.
    pub fn supersedes(&self, other: &ConnectivityState) -> bool {
        self.seq > other.seq
    }
}

/// Generation number of a spawned backend instance.
///
/// Every successful spawn gets a fresh id, so events from an earlier
/// instance can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle status of a backend process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    Starting,
    Running,
    Exited(i32),
    Failed(String),
}

impl ProcessStatus {
    /// `Exited` and `Failed` are terminal: the OS process is gone.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Exited(_) | ProcessStatus::Failed(_))
    }
}

/// Result of a spawn attempt, consumed once by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisionOutcome {
    Started { handle: HandleId, pid: u32 },
    BinaryMissing(PathBuf),
    SpawnError(String),
    StartupTimeout(Duration),
}

impl SupervisionOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, SupervisionOutcome::Started { .. })
    }
}

impl fmt::Display for SupervisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisionOutcome::Started { handle, pid } => {
                write!(f, "backend {handle} started (pid {pid})")
            }
            SupervisionOutcome::BinaryMissing(path) => {
                write!(f, "backend executable not found or not executable: {}", path.display())
            }
            SupervisionOutcome::SpawnError(cause) => write!(f, "failed to spawn backend: {cause}"),
            SupervisionOutcome::StartupTimeout(limit) => write!(
                f,
                "backend did not confirm startup within {}ms",
                limit.as_millis()
            ),
        }
    }
}

/// How the supervisor decides that a freshly spawned backend is up.
#[derive(Debug, Clone)]
pub enum ReadinessCheck {
    /// The OS reported a pid and the process has not already exited.
    Spawned,
    /// A line on stdout or stderr matches the pattern.
    Stdout(Regex),
    /// A TCP connection to `host:port` succeeds.
    Tcp(String),
}

/// Everything needed to launch the backend.
#[derive(Debug, Clone)]
pub struct BackendSpec {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub startup_timeout: Duration,
    pub grace_period: Duration,
    pub readiness: ReadinessCheck,
}

impl BackendSpec {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            startup_timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(3),
            readiness: ReadinessCheck::Spawned,
        }
    }

    /// The backend runs from its own directory so it finds co-located
    /// configuration such as `.env` files.
    pub fn working_dir(&self) -> &Path {
        match self.executable.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// Bounded restart-on-crash policy applied by the coordinator.
///
/// `max_restarts = 0` means an unexpected exit is reported and never
/// followed by a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashPolicy {
    pub max_restarts: u32,
    pub window: Duration,
}

impl Default for CrashPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 0,
            window: Duration::from_secs(60),
        }
    }
}
