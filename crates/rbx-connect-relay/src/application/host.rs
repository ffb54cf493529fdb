//! Seams to the host that embeds the relay.
//!
//! The host (an IDE extension runtime, or the terminal host in
//! `infrastructure::console_host`) owns the UI: an output channel with
//! leveled lines, transient popups, and an input box.  The relay only talks to
//! it through these traits, so dispatch logic can be tested with a recording
//! fake instead of a real UI.

use async_trait::async_trait;
use rbx_connect_core::LogSeverity;

/// Receives log lines and popups from the relay.
///
/// Implementations must be cheap and non-blocking: they are called from the
/// relay's event loop.
pub trait HostSink: Send + Sync {
    /// Output channel, info level.
    fn info(&self, line: &str);
    /// Output channel, debug level.
    fn debug(&self, line: &str);
    /// Output channel, warning level.
    fn warn(&self, line: &str);
    /// Output channel, error level.
    fn error(&self, line: &str);

    /// Transient informational popup.
    fn show_info(&self, message: &str);
    /// Transient warning popup.
    fn show_warning(&self, message: &str);
    /// Transient error popup.
    fn show_error(&self, message: &str);

    /// Routes a client log line to the output channel for `severity`.
    ///
    /// | Severity      | Channel |
    /// |---------------|---------|
    /// | `Output`      | info    |
    /// | `Information` | debug   |
    /// | `Warning`     | warn    |
    /// | `Error`       | error   |
    fn log(&self, severity: LogSeverity, line: &str) {
        match severity {
            LogSeverity::Output => self.info(line),
            LogSeverity::Information => self.debug(line),
            LogSeverity::Warning => self.warn(line),
            LogSeverity::Error => self.error(line),
        }
    }
}

/// Collects a snippet of code from the user.
///
/// Returns `None` when the user dismisses the prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, title: &str, placeholder: &str) -> Option<String>;
}


#[cfg(test)]
mod tests {
    use super::recording::{Channel, RecordingHost};
    use super::*;

    #[test]
    fn test_log_routes_each_severity_to_its_channel() {
        let host = RecordingHost::default();

        host.log(LogSeverity::Output, "out");
        host.log(LogSeverity::Information, "info");
        host.log(LogSeverity::Warning, "warn");
        host.log(LogSeverity::Error, "err");

        assert_eq!(
            host.records(),
            vec![
                (Channel::Info, "out".to_string()),
                (Channel::Debug, "info".to_string()),
                (Channel::Warn, "warn".to_string()),
                (Channel::Error, "err".to_string()),
            ]
        );
    }
}
