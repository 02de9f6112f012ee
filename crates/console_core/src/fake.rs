//! In-memory backend that stands in for both nodes.
//!
//! Without scripted replies it behaves like a healthy machine: `/sensors` reports the
//! configured temperature, `/state` reports the mixer line and every control command is
//! acknowledged and remembered. Tests queue replies per path to inject latency, reorder
//! responses or fail individual calls.

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared::{
    domain::ActuatorId,
    protocol::{ControlRequest, MIXER_STATE_PATH, SENSORS_PATH},
};

use crate::{
    device::{Ack, DeviceClient, DeviceEndpoint},
    error::{ConsoleError, Result},
};

const DEFAULT_TEMPERATURE_C: f64 = 25.0;

#[derive(Debug, Clone)]
pub struct FakeReply<T> {
    pub delay: Duration,
    pub result: Result<T>,
}

impl<T> FakeReply<T> {
    pub fn ok(delay: Duration, value: T) -> Self {
        Self {
            delay,
            result: Ok(value),
        }
    }

    pub fn fail(delay: Duration, error: ConsoleError) -> Self {
        Self {
            delay,
            result: Err(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub path: String,
    pub status: bool,
}

struct FakeNodeState {
    temperature: f64,
    mixer_status: bool,
    lines: HashMap<ActuatorId, bool>,
    latency: Duration,
    query_replies: HashMap<String, VecDeque<FakeReply<Value>>>,
    command_replies: HashMap<String, VecDeque<FakeReply<()>>>,
    queries: Vec<String>,
    commands: Vec<CommandRecord>,
}

pub struct FakeDeviceClient {
    state: Mutex<FakeNodeState>,
}

impl Default for FakeDeviceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDeviceClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeNodeState {
                temperature: DEFAULT_TEMPERATURE_C,
                mixer_status: false,
                lines: HashMap::new(),
                latency: Duration::ZERO,
                query_replies: HashMap::new(),
                command_replies: HashMap::new(),
                queries: Vec::new(),
                commands: Vec::new(),
            }),
        }
    }

    pub fn with_temperature(self, temperature: f64) -> Self {
        self.set_temperature(temperature);
        self
    }

    pub fn set_temperature(&self, temperature: f64) {
        self.state.lock().temperature = temperature;
    }

    /// Delay applied to every call that has no scripted reply.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    pub fn push_query_reply(&self, path: &str, reply: FakeReply<Value>) {
        self.state
            .lock()
            .query_replies
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn push_temperature(&self, delay: Duration, temperature: f64) {
        self.push_query_reply(
            SENSORS_PATH,
            FakeReply::ok(delay, json!({ "temperature": temperature })),
        );
    }

    pub fn push_command_reply(&self, actuator: ActuatorId, reply: FakeReply<()>) {
        self.state
            .lock()
            .command_replies
            .entry(actuator.control_path())
            .or_default()
            .push_back(reply);
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }

    pub fn commands(&self) -> Vec<CommandRecord> {
        self.state.lock().commands.clone()
    }

    pub fn command_count(&self, actuator: ActuatorId) -> usize {
        let path = actuator.control_path();
        self.state
            .lock()
            .commands
            .iter()
            .filter(|record| record.path == path)
            .count()
    }

    /// Last wire level acknowledged for `actuator`.
    pub fn line_level(&self, actuator: ActuatorId) -> Option<bool> {
        self.state.lock().lines.get(&actuator).copied()
    }
}

#[async_trait]
impl DeviceClient for FakeDeviceClient {
    async fn query(&self, endpoint: &DeviceEndpoint, path: &str) -> Result<Value> {
        let node = endpoint.kind();
        let reply = {
            let mut state = self.state.lock();
            state.queries.push(path.to_string());
            let scripted = state
                .query_replies
                .get_mut(path)
                .and_then(VecDeque::pop_front);
            match scripted {
                Some(reply) => reply,
                None => {
                    let result = match path {
                        SENSORS_PATH => Ok(json!({ "temperature": state.temperature })),
                        MIXER_STATE_PATH => Ok(json!({ "mixerStatus": state.mixer_status })),
                        _ => Err(ConsoleError::protocol(node, format!("{path} returned 404"))),
                    };
                    FakeReply {
                        delay: state.latency,
                        result,
                    }
                }
            }
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }

    async fn command(
        &self,
        endpoint: &DeviceEndpoint,
        path: &str,
        payload: &ControlRequest,
    ) -> Result<Ack> {
        let node = endpoint.kind();
        let actuator = path
            .strip_prefix("/control/")
            .and_then(|name| name.parse::<ActuatorId>().ok())
            .filter(|actuator| endpoint.accepts(*actuator));

        let reply = {
            let mut state = self.state.lock();
            state.commands.push(CommandRecord {
                path: path.to_string(),
                status: payload.status,
            });
            let scripted = state
                .command_replies
                .get_mut(path)
                .and_then(VecDeque::pop_front);
            match (scripted, actuator) {
                (Some(reply), _) => reply,
                (None, Some(_)) => FakeReply::ok(state.latency, ()),
                (None, None) => FakeReply::fail(
                    state.latency,
                    ConsoleError::protocol(node, format!("{path} returned 404")),
                ),
            }
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result?;

        if let Some(actuator) = actuator {
            let mut state = self.state.lock();
            state.lines.insert(actuator, payload.status);
            if actuator == ActuatorId::Mixer {
                state.mixer_status = payload.status;
            }
        }
        Ok(Ack { status: 200 })
    }
}
