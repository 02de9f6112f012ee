use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Internal,
}

/// JSON error body returned by a node on a non-success status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown actuator '{0}' (expected grinder, valve, heater or mixer)")]
    UnknownActuator(String),
    #[error("unknown node role '{0}' (expected mechanical or mixer)")]
    UnknownNode(String),
    #[error("unknown severity '{0}' (expected ALL, INFO, WARNING or ERROR)")]
    UnknownSeverity(String),
    #[error("unknown command outcome '{0}'")]
    UnknownOutcome(String),
}
