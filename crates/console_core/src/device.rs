use std::{future::Future, time::Duration};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{ActuatorId, NodeKind, SensorKind},
    protocol::{ControlRequest, MixerStateResponse, SensorsResponse, MIXER_STATE_PATH, SENSORS_PATH},
};
use url::Url;

use crate::error::{ConsoleError, Result};

/// Upper bound for any single outbound device call.
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_MECHANICAL_URL: &str = "http://192.168.47.185";
pub const DEFAULT_MIXER_URL: &str = "http://192.168.47.161";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    kind: NodeKind,
    base_url: Url,
}

impl DeviceEndpoint {
    pub fn new(kind: NodeKind, base_url: Url) -> Self {
        Self { kind, base_url }
    }

    pub fn parse(kind: NodeKind, raw: &str) -> std::result::Result<Self, url::ParseError> {
        Ok(Self::new(kind, Url::parse(raw.trim())?))
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn sensors(&self) -> &'static [SensorKind] {
        self.kind.sensors()
    }

    pub fn actuators(&self) -> &'static [ActuatorId] {
        self.kind.actuators()
    }

    pub fn accepts(&self, actuator: ActuatorId) -> bool {
        self.actuators().contains(&actuator)
    }

    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// The two fixed controller nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub mechanical: DeviceEndpoint,
    pub mixer: DeviceEndpoint,
}

impl Endpoints {
    pub fn parse(mechanical_url: &str, mixer_url: &str) -> std::result::Result<Self, url::ParseError> {
        Ok(Self {
            mechanical: DeviceEndpoint::parse(NodeKind::Mechanical, mechanical_url)?,
            mixer: DeviceEndpoint::parse(NodeKind::Mixer, mixer_url)?,
        })
    }

    pub fn for_node(&self, node: NodeKind) -> &DeviceEndpoint {
        match node {
            NodeKind::Mechanical => &self.mechanical,
            NodeKind::Mixer => &self.mixer,
        }
    }

    pub fn for_actuator(&self, actuator: ActuatorId) -> &DeviceEndpoint {
        self.for_node(actuator.node())
    }
}

/// Successful acknowledgment of a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub status: u16,
}

/// Single request/response call against one node. Implementations do not retry.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn query(&self, endpoint: &DeviceEndpoint, path: &str) -> Result<Value>;

    async fn command(
        &self,
        endpoint: &DeviceEndpoint,
        path: &str,
        payload: &ControlRequest,
    ) -> Result<Ack>;
}

pub async fn read_temperature(client: &dyn DeviceClient, endpoint: &DeviceEndpoint) -> Result<f64> {
    let body = client.query(endpoint, SENSORS_PATH).await?;
    let reading: SensorsResponse = decode(endpoint.kind(), body)?;
    Ok(reading.temperature)
}

pub async fn read_mixer_state(client: &dyn DeviceClient, endpoint: &DeviceEndpoint) -> Result<bool> {
    let body = client.query(endpoint, MIXER_STATE_PATH).await?;
    let reading: MixerStateResponse = decode(endpoint.kind(), body)?;
    Ok(reading.mixer_status)
}

/// Runs `call` under `timeout`; expiry is reported as a network failure.
pub async fn bounded<T, F>(node: NodeKind, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ConsoleError::network(
            node,
            format!("request timed out after {}ms", timeout.as_millis()),
        )),
    }
}

fn decode<T: DeserializeOwned>(node: NodeKind, body: Value) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|err| ConsoleError::protocol(node, format!("unexpected response body: {err}")))
}
