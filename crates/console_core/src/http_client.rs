use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client, Response};
use serde_json::Value;
use shared::{domain::NodeKind, error::ApiError, protocol::ControlRequest};
use tracing::debug;

use crate::{
    device::{Ack, DeviceClient, DeviceEndpoint, MAX_REQUEST_TIMEOUT},
    error::{ConsoleError, Result},
};

/// Networked backend: one JSON-over-HTTP request per call, bounded by a client-wide timeout.
pub struct HttpDeviceClient {
    http: Client,
    timeout: Duration,
}

impl HttpDeviceClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let timeout = timeout.min(MAX_REQUEST_TIMEOUT);
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { http, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn query(&self, endpoint: &DeviceEndpoint, path: &str) -> Result<Value> {
        let node = endpoint.kind();
        let url = endpoint.url_for(path);
        debug!(%node, %url, "device query");

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| transport_error(node, &err))?;
        let response = ensure_success(node, path, response).await?;

        response.json::<Value>().await.map_err(|err| {
            if err.is_timeout() {
                transport_error(node, &err)
            } else {
                ConsoleError::protocol(node, format!("malformed JSON from {path}: {err}"))
            }
        })
    }

    async fn command(
        &self,
        endpoint: &DeviceEndpoint,
        path: &str,
        payload: &ControlRequest,
    ) -> Result<Ack> {
        let node = endpoint.kind();
        let url = endpoint.url_for(path);
        debug!(%node, %url, wire_status = payload.status, "device command");

        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|err| transport_error(node, &err))?;
        let response = ensure_success(node, path, response).await?;

        Ok(Ack {
            status: response.status().as_u16(),
        })
    }
}

fn transport_error(node: NodeKind, err: &reqwest::Error) -> ConsoleError {
    if err.is_timeout() {
        ConsoleError::network(node, "request timed out")
    } else if err.is_connect() {
        ConsoleError::network(node, format!("connection failed: {err}"))
    } else {
        ConsoleError::network(node, err.to_string())
    }
}

async fn ensure_success(node: NodeKind, path: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => api_error.message,
        Err(_) if body.trim().is_empty() => "empty body".to_string(),
        Err(_) => body.trim().to_string(),
    };
    Err(ConsoleError::protocol(
        node,
        format!("{path} returned {status}: {detail}"),
    ))
}

#[cfg(test)]
#[path = "tests/http_client_tests.rs"]
mod tests;
