use std::io::{self, Write};

use console_core::{Notification, NotificationSink, NotifyError};
use parking_lot::Mutex;
use shared::domain::Severity;

const BELL: &str = "\x07";

/// Prints notifications on the operator's terminal. Audible ones ring the terminal bell.
pub struct TerminalSink<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalSink<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> NotificationSink for TerminalSink<W> {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let tag = match notification.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        let bell = if notification.with_audio { BELL } else { "" };

        let mut out = self.out.lock();
        writeln!(out, "{bell}[{tag}] {}", notification.message)
            .and_then(|()| out.flush())
            .map_err(|err| NotifyError(err.to_string()))
    }
}
