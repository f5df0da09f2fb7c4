// src/shell/console.rs

use std::sync::Mutex;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::lifecycle::LifecycleEvent;

use super::{FallbackNotice, ShellPresenter};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shown {
    Primary,
    Fallback(FallbackNotice),
}

/// Headless presenter: announces surface changes on stdout.
///
/// Repeated calls for the surface already shown print nothing.
#[derive(Debug)]
pub struct ConsolePresenter {
    url: Option<String>,
    shown: Mutex<Option<Shown>>,
}

impl ConsolePresenter {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            shown: Mutex::new(None),
        }
    }

    /// Record `next`; returns false if it was already showing.
    fn switch_to(&self, next: Shown) -> bool {
        let mut shown = match self.shown.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if shown.as_ref() == Some(&next) {
            return false;
        }
        *shown = Some(next);
        true
    }
}

impl ShellPresenter for ConsolePresenter {
    fn present_primary(&self) {
        if !self.switch_to(Shown::Primary) {
            return;
        }
        match &self.url {
            Some(url) => println!("[launchgate] ready: {url}"),
            None => println!("[launchgate] ready"),
        }
        info!(url = ?self.url, "primary surface presented");
    }

    fn present_fallback(&self, notice: &FallbackNotice) {
        if !self.switch_to(Shown::Fallback(notice.clone())) {
            return;
        }
        println!("[launchgate] {notice}");
        info!(%notice, "fallback surface presented");
    }
}

/// Read shell commands from stdin and turn them into lifecycle events:
/// `quit`, `close` (all windows closed), `activate`.
///
/// Ends quietly on EOF.
pub fn spawn_stdin_commands(tx: mpsc::Sender<LifecycleEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            let event = match parse_command(&line) {
                Some(event) => event,
                None => {
                    if !line.trim().is_empty() {
                        warn!(command = %line.trim(), "unknown command (expected quit, close or activate)");
                    }
                    continue;
                }
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }

        debug!("stdin command source finished");
    });
}

fn parse_command(line: &str) -> Option<LifecycleEvent> {
    match line.trim().to_lowercase().as_str() {
        "quit" | "q" | "exit" => Some(LifecycleEvent::QuitRequested),
        "close" => Some(LifecycleEvent::AllWindowsClosed),
        "activate" | "open" => Some(LifecycleEvent::Activated),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert!(matches!(parse_command(" QUIT "), Some(LifecycleEvent::QuitRequested)));
        assert!(matches!(parse_command("close"), Some(LifecycleEvent::AllWindowsClosed)));
        assert!(matches!(parse_command("open"), Some(LifecycleEvent::Activated)));
        assert!(parse_command("restart").is_none());
    }

    #[test]
    fn repeated_surface_is_a_no_op() {
        let presenter = ConsolePresenter::new(None);
        assert!(presenter.switch_to(Shown::Primary));
        assert!(!presenter.switch_to(Shown::Primary));
        assert!(presenter.switch_to(Shown::Fallback(FallbackNotice::Offline)));
        assert!(!presenter.switch_to(Shown::Fallback(FallbackNotice::Offline)));
    }
}
