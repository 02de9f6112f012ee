//! Bench stand-in for one controller node of the processing machine.

use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::Serialize;
use shared::{
    domain::{ActuatorId, NodeKind},
    error::{ApiError, ErrorCode},
    protocol::{ControlRequest, MixerStateResponse, SensorsResponse},
};
use tracing::{info, warn};

mod config;

use config::load_settings;

/// Rise reported by `/sensors` while the heater line is on.
const HEATER_RISE_C: f64 = 40.0;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

struct NodeState {
    role: NodeKind,
    ambient: f64,
    lines: Mutex<BTreeMap<ActuatorId, bool>>,
}

type SharedNode = Arc<NodeState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    role: NodeKind,
}

impl NodeState {
    fn new(role: NodeKind, ambient: f64) -> Self {
        Self {
            role,
            ambient,
            lines: Mutex::new(BTreeMap::new()),
        }
    }

    fn line(&self, actuator: ActuatorId) -> bool {
        self.lines.lock().get(&actuator).copied().unwrap_or(false)
    }

    fn temperature(&self) -> f64 {
        if self.line(ActuatorId::Heater) {
            self.ambient + HEATER_RISE_C
        } else {
            self.ambient
        }
    }

    fn require_role(&self, role: NodeKind, what: &str) -> ApiResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(not_found(format!("{what} is not served by the {} node", self.role)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings()?;
    let state = Arc::new(NodeState::new(settings.role, settings.temperature));
    let app = build_router(state);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, role = %settings.role, "node simulator listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "failed to listen for ctrl-c");
            }
        })
        .await?;
    Ok(())
}

fn build_router(state: SharedNode) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sensors", get(sensors))
        .route("/state", get(mixer_state))
        .route("/control/:actuator", post(control))
        .with_state(state)
}

async fn healthz(State(state): State<SharedNode>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        role: state.role,
    })
}

async fn sensors(State(state): State<SharedNode>) -> ApiResult<Json<SensorsResponse>> {
    state.require_role(NodeKind::Mechanical, "/sensors")?;
    Ok(Json(SensorsResponse {
        temperature: state.temperature(),
    }))
}

async fn mixer_state(State(state): State<SharedNode>) -> ApiResult<Json<MixerStateResponse>> {
    state.require_role(NodeKind::Mixer, "/state")?;
    Ok(Json(MixerStateResponse {
        mixer_status: state.line(ActuatorId::Mixer),
    }))
}

async fn control(
    State(state): State<SharedNode>,
    Path(name): Path<String>,
    Json(req): Json<ControlRequest>,
) -> ApiResult<StatusCode> {
    let actuator: ActuatorId = name
        .parse()
        .map_err(|e: shared::error::ParseError| not_found(e.to_string()))?;
    if actuator.as_str() != name {
        return Err(not_found(format!("unknown control path '/control/{name}'")));
    }
    state.require_role(actuator.node(), &format!("/control/{name}"))?;

    state.lines.lock().insert(actuator, req.status);
    info!(%actuator, line = req.status, "control line set");
    Ok(StatusCode::OK)
}

fn not_found(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(ErrorCode::NotFound, message)),
    )
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
