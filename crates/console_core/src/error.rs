use shared::domain::{ActuatorId, NodeKind};
use thiserror::Error;

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// Node unreachable: connection refused, reset, or the request timed out.
    #[error("{node} node unreachable: {reason}")]
    Network { node: NodeKind, reason: String },
    /// A response arrived but was malformed or carried a non-success status.
    #[error("{node} node protocol error: {reason}")]
    Protocol { node: NodeKind, reason: String },
    #[error("a command for {0} is already in flight")]
    Busy(ActuatorId),
    #[error("timer duration must be between 1 and 120 minutes, got {0}")]
    InvalidDuration(u32),
    #[error("timer is already running")]
    AlreadyRunning,
    #[error("audit store failure: {0}")]
    Store(String),
    #[error("console session has ended")]
    SessionClosed,
}

impl ConsoleError {
    pub fn network(node: NodeKind, reason: impl Into<String>) -> Self {
        Self::Network {
            node,
            reason: reason.into(),
        }
    }

    pub fn protocol(node: NodeKind, reason: impl Into<String>) -> Self {
        Self::Protocol {
            node,
            reason: reason.into(),
        }
    }

    pub fn is_device_failure(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Protocol { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("User already exists")]
    UserAlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);
