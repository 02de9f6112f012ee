use std::sync::Arc;

use parking_lot::Mutex;
use shared::domain::Severity;
use tracing::{error, info, warn};

use crate::error::NotifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    ActuatorChanged,
    CommandFailed,
    CommandRejected,
    AuditRecorded,
    AuditFailed,
    TimerStarted,
    TimerRejected,
    TimerFinished,
    SensorUnavailable,
    SensorRestored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub severity: Severity,
    pub with_audio: bool,
}

impl Notification {
    pub fn new(kind: NotificationKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
            with_audio: false,
        }
    }

    pub fn with_audio(mut self) -> Self {
        self.with_audio = true;
        self
    }
}

/// User-visible signal. Implementations may fail; the core never sees the failure.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Fire-and-forget front for a sink: failed deliveries are logged and dropped.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub fn send(&self, notification: Notification) {
        if let Err(err) = self.sink.notify(&notification) {
            warn!(
                kind = ?notification.kind,
                message = %notification.message,
                %err,
                "notification dropped"
            );
        }
    }
}

/// Headless sink: every notification becomes a log line.
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let Notification {
            kind,
            message,
            severity,
            with_audio,
        } = notification;
        match severity {
            Severity::Info => info!(kind = ?kind, audio = with_audio, "{message}"),
            Severity::Warning => warn!(kind = ?kind, audio = with_audio, "{message}"),
            Severity::Error => error!(kind = ?kind, audio = with_audio, "{message}"),
        }
        Ok(())
    }
}

/// Keeps every delivered notification in memory; optionally refuses audio.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
    audio_unavailable: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visual part is recorded, audible notifications then fail.
    pub fn without_audio() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            audio_unavailable: true,
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.delivered
            .lock()
            .iter()
            .filter(|notification| notification.kind == kind)
            .count()
    }

    pub fn messages(&self) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .map(|notification| notification.message.clone())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.delivered.lock().push(notification.clone());
        if notification.with_audio && self.audio_unavailable {
            return Err(NotifyError("audio device unavailable".to_string()));
        }
        Ok(())
    }
}
