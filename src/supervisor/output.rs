// src/supervisor/output.rs

//! Forwarding of backend stdout/stderr into the logging sink.
//!
//! Each stream is drained by its own Tokio task so a chatty backend can
//! never fill its pipe buffer and stall. Lines are emitted under the
//! `backend-stdout` / `backend-stderr` tracing targets.

use std::sync::Arc;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::types::HandleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Fires `notify` the first time a line matches `pattern`.
#[derive(Debug, Clone)]
pub(crate) struct ReadyMatcher {
    pub pattern: Regex,
    pub notify: Arc<Notify>,
}

/// Spawn drain tasks for whichever pipes are present.
pub(crate) fn forward_output(
    handle: HandleId,
    pid: u32,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    ready: Option<ReadyMatcher>,
) {
    if let Some(stdout) = stdout {
        tokio::spawn(pump(stdout, Stream::Stdout, handle, pid, ready.clone()));
    }
    if let Some(stderr) = stderr {
        tokio::spawn(pump(stderr, Stream::Stderr, handle, pid, ready));
    }
}

async fn pump<R>(reader: R, stream: Stream, handle: HandleId, pid: u32, ready: Option<ReadyMatcher>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut ready = ready;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(handle = %handle, pid, error = %e, ?stream, "backend pipe read failed");
                break;
            }
        }

        // Non-UTF-8 output is logged lossily rather than ending the drain.
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);

        match stream {
            Stream::Stdout => info!(target: "backend-stdout", handle = %handle, pid, "{line}"),
            Stream::Stderr => warn!(target: "backend-stderr", handle = %handle, pid, "{line}"),
        }

        if let Some(matcher) = &ready {
            if matcher.pattern.is_match(line) {
                debug!(handle = %handle, pid, ?stream, "readiness pattern matched");
                matcher.notify.notify_one();
                ready = None;
            }
        }
    }

    debug!(handle = %handle, pid, ?stream, "backend output stream closed");
}
