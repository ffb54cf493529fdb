//! Terminal host: renders relay output through `tracing` and reads code from
//! stdin.
//!
//! This is the host used by the `rbx-connect` binary.  Output-channel lines go
//! to the `rbx_connect::output` target at the matching level; popups go to
//! `rbx_connect::popup`.  Filter them with `RUST_LOG` like any other target,
//! e.g. `RUST_LOG=rbx_connect::output=debug`.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::application::{HostSink, Prompter};

const OUTPUT_TARGET: &str = "rbx_connect::output";
const POPUP_TARGET: &str = "rbx_connect::popup";

/// [`HostSink`] that writes everything to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHost;

impl HostSink for ConsoleHost {
    fn info(&self, line: &str) {
        info!(target: OUTPUT_TARGET, "{line}");
    }

    fn debug(&self, line: &str) {
        debug!(target: OUTPUT_TARGET, "{line}");
    }

    fn warn(&self, line: &str) {
        warn!(target: OUTPUT_TARGET, "{line}");
    }

    fn error(&self, line: &str) {
        error!(target: OUTPUT_TARGET, "{line}");
    }

    fn show_info(&self, message: &str) {
        info!(target: POPUP_TARGET, "{message}");
    }

    fn show_warning(&self, message: &str) {
        warn!(target: POPUP_TARGET, "{message}");
    }

    fn show_error(&self, message: &str) {
        error!(target: POPUP_TARGET, "{message}");
    }
}

/// [`Prompter`] that reads one line of stdin per prompt.
///
/// Stdin is read on a dedicated OS thread: Tokio's own stdin reader blocks
/// runtime shutdown until the next line arrives.  A blank line counts as a
/// dismissed prompt.  Once stdin reaches EOF every prompt returns `None` and
/// [`StdinPrompter::at_eof`] turns `true`.
pub struct StdinPrompter {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
    eof: AtomicBool,
}

impl StdinPrompter {
    /// Spawns the stdin reader thread.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("failed to read stdin: {e}");
                        break;
                    }
                }
            }
        });
        Self::from_receiver(rx)
    }

    fn from_receiver(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: Mutex::new(lines),
            eof: AtomicBool::new(false),
        }
    }

    /// `true` once stdin has been fully consumed.
    pub fn at_eof(&self) -> bool {
        self.eof.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn prompt(&self, title: &str, placeholder: &str) -> Option<String> {
        if self.at_eof() {
            return None;
        }
        eprint!("[{title}] {placeholder}: ");

        match self.lines.lock().await.recv().await {
            Some(line) if line.trim().is_empty() => None,
            Some(line) => Some(line),
            None => {
                self.eof.store(true, Ordering::Relaxed);
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
