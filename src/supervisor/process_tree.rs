// src/supervisor/process_tree.rs

//! Signalling a backend together with every process it forked.
//!
//! On Unix the backend is spawned as the leader of its own process group, so
//! signalling the group (`killpg`) reaches all descendants that did not
//! deliberately leave it. On Windows the equivalent is `taskkill /T`.

use std::io;

/// Strength of a tree-wide termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeSignal {
    /// SIGTERM / `taskkill /T`: ask politely.
    Graceful,
    /// SIGKILL / `taskkill /F /T`: cannot be ignored.
    Force,
}

/// Send `signal` to the process tree rooted at `pid`.
///
/// A tree that no longer exists is not an error.
#[cfg(unix)]
pub fn signal_tree(pid: u32, signal: TreeSignal) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};

    let sig = match signal {
        TreeSignal::Graceful => Signal::SIGTERM,
        TreeSignal::Force => Signal::SIGKILL,
    };

    match killpg(to_pid(pid)?, sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from_raw_os_error(e as i32)),
    }
}

#[cfg(windows)]
pub fn signal_tree(pid: u32, signal: TreeSignal) -> io::Result<()> {
    use std::process::{Command, Stdio};

    let pid_arg = pid.to_string();
    let mut args = vec!["/PID", pid_arg.as_str(), "/T"];
    if signal == TreeSignal::Force {
        args.push("/F");
    }

    let output = Command::new("taskkill")
        .args(&args)
        .stdin(Stdio::null())
        .output()?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
    if stderr.contains("not found") || stderr.contains("no running instance") {
        return Ok(());
    }
    Err(io::Error::other(format!("taskkill failed for pid {pid}: {}", stderr.trim())))
}

/// True if a process with this pid exists (zombies included).
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;

    match to_pid(pid) {
        Ok(p) => !matches!(kill(p, None), Err(Errno::ESRCH)),
        Err(_) => false,
    }
}

/// True if any member of the process group led by `pgid` still exists.
#[cfg(unix)]
pub fn group_alive(pgid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;

    match to_pid(pgid) {
        Ok(p) => !matches!(killpg(p, None), Err(Errno::ESRCH)),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn to_pid(pid: u32) -> io::Result<nix::unistd::Pid> {
    // pid 0 and negative values address whole groups or every process.
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(nix::unistd::Pid::from_raw(raw)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("pid {pid} is out of range"),
        )),
    }
}
