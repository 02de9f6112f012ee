use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseError;

/// Readings above this are rendered as a high-temperature warning.
pub const HIGH_TEMPERATURE_C: f64 = 200.0;

/// Amount recorded for one completed grinding cycle.
pub const UNITS_PER_GRINDING_CYCLE: u32 = 1;

/// Operator email stamped on audit records when nobody is signed in.
pub const UNKNOWN_OPERATOR_EMAIL: &str = "Unknown User";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorId {
    Grinder,
    Valve,
    Heater,
    Mixer,
}

impl ActuatorId {
    pub const ALL: [ActuatorId; 4] = [
        ActuatorId::Grinder,
        ActuatorId::Valve,
        ActuatorId::Heater,
        ActuatorId::Mixer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActuatorId::Grinder => "grinder",
            ActuatorId::Valve => "valve",
            ActuatorId::Heater => "heater",
            ActuatorId::Mixer => "mixer",
        }
    }

    /// Name shown to operators. The valve feeds the pump and the heater runs the juicer.
    pub fn label(self) -> &'static str {
        match self {
            ActuatorId::Grinder => "Grinder",
            ActuatorId::Valve => "Pump",
            ActuatorId::Heater => "Juicer",
            ActuatorId::Mixer => "Mixer",
        }
    }

    pub fn node(self) -> NodeKind {
        match self {
            ActuatorId::Mixer => NodeKind::Mixer,
            ActuatorId::Grinder | ActuatorId::Valve | ActuatorId::Heater => NodeKind::Mechanical,
        }
    }

    pub fn control_path(self) -> String {
        format!("/control/{}", self.as_str())
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActuatorId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grinder" => Ok(ActuatorId::Grinder),
            "valve" | "pump" => Ok(ActuatorId::Valve),
            "heater" | "juicer" => Ok(ActuatorId::Heater),
            "mixer" => Ok(ActuatorId::Mixer),
            _ => Err(ParseError::UnknownActuator(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Temperature sensor plus grinder, valve and heater outputs.
    Mechanical,
    /// Mixer output plus mixer-state sensor.
    Mixer,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Mechanical => "mechanical",
            NodeKind::Mixer => "mixer",
        }
    }

    pub fn sensors(self) -> &'static [SensorKind] {
        match self {
            NodeKind::Mechanical => &[SensorKind::Temperature],
            NodeKind::Mixer => &[SensorKind::MixerState],
        }
    }

    pub fn actuators(self) -> &'static [ActuatorId] {
        match self {
            NodeKind::Mechanical => &[ActuatorId::Grinder, ActuatorId::Valve, ActuatorId::Heater],
            NodeKind::Mixer => &[ActuatorId::Mixer],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mechanical" => Ok(NodeKind::Mechanical),
            "mixer" => Ok(NodeKind::Mixer),
            _ => Err(ParseError::UnknownNode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    MixerState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorState {
    pub desired: bool,
    pub confirmed: bool,
    pub pending: bool,
}

/// Latest temperature reading. `sequence` is the poll that produced it; 0 means no
/// poll has succeeded yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub temperature: Option<f64>,
    pub captured_at: Option<DateTime<Utc>>,
    pub sequence: u64,
}

impl SensorSnapshot {
    pub fn is_high_temperature(&self) -> bool {
        self.temperature
            .is_some_and(|temperature| temperature > HIGH_TEMPERATURE_C)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Ready,
    JuiceProcessing,
}

impl MachineStatus {
    pub fn from_heater(heater_confirmed: bool) -> Self {
        if heater_confirmed {
            MachineStatus::JuiceProcessing
        } else {
            MachineStatus::Ready
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MachineStatus::Ready => "Ready",
            MachineStatus::JuiceProcessing => "Juice Processing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingEvent {
    pub event_id: Uuid,
    pub amount: u32,
    pub timestamp: DateTime<Utc>,
    pub operator_id: Option<String>,
    pub operator_email: String,
}

impl ProcessingEvent {
    pub fn grinding_cycle(operator: Option<&Operator>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            amount: UNITS_PER_GRINDING_CYCLE,
            timestamp,
            operator_id: operator.map(|op| op.id.clone()),
            operator_email: operator
                .map(|op| op.email.clone())
                .unwrap_or_else(|| UNKNOWN_OPERATOR_EMAIL.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Severity::Info),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            _ => Err(ParseError::UnknownSeverity(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Confirmed,
    Failed,
    Rejected,
}

impl CommandOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandOutcome::Confirmed => "confirmed",
            CommandOutcome::Failed => "failed",
            CommandOutcome::Rejected => "rejected",
        }
    }
}

impl FromStr for CommandOutcome {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(CommandOutcome::Confirmed),
            "failed" => Ok(CommandOutcome::Failed),
            "rejected" => Ok(CommandOutcome::Rejected),
            _ => Err(ParseError::UnknownOutcome(s.to_string())),
        }
    }
}

/// One resolved actuator command, kept for the device log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub timestamp: DateTime<Utc>,
    pub actuator: ActuatorId,
    pub requested: bool,
    pub outcome: CommandOutcome,
    pub severity: Severity,
    pub message: String,
    pub operator_email: String,
}
