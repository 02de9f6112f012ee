//! JSON bodies exchanged with the controller nodes, plus the persisted audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ProcessingEvent;

pub const SENSORS_PATH: &str = "/sensors";
pub const MIXER_STATE_PATH: &str = "/state";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorsResponse {
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerStateResponse {
    pub mixer_status: bool,
}

/// Body of `POST /control/{actuator}`. For the grinder this is the raw line level,
/// not the run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
    pub operator_email: String,
}

impl From<&ProcessingEvent> for AuditRecord {
    fn from(event: &ProcessingEvent) -> Self {
        Self {
            amount: i64::from(event.amount),
            timestamp: event.timestamp,
            operator_email: event.operator_email.clone(),
        }
    }
}
