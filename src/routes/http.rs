// Handlers: version, groups, trace, VLAN change, load and device health snapshots

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;

use super::AppState;
use crate::models::{MacAddress, TraceBatch, VlanChangeRequest, VlanChangeResult};
use crate::transport::Connector;
use crate::version::{NAME, VERSION};

/// Header naming the caller for audit events. Authentication happens upstream.
const CALLER_HEADER: &str = "x-caller";

fn caller(headers: &HeaderMap) -> String {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

fn error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/groups
pub(super) async fn groups_handler<C: Connector>(State(state): State<AppState<C>>) -> impl IntoResponse {
    Json(state.inventory.groups())
}

#[derive(Debug, Deserialize)]
pub(super) struct TraceBody {
    group: String,
    mac: String,
}

/// POST /api/trace: fans out over every device in the group. Outcomes are unfiltered.
pub(super) async fn trace_handler<C: Connector>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    Json(body): Json<TraceBody>,
) -> axum::response::Response {
    let mac = match MacAddress::parse(&body.mac) {
        Ok(m) => m,
        Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let Some(devices) = state.inventory.devices(&body.group) else {
        return error(StatusCode::NOT_FOUND, format!("unknown group {}", body.group));
    };
    let batch = state
        .tracer
        .trace_all(&body.group, devices, &mac, &caller(&headers))
        .await;
    let status = match &batch {
        TraceBatch::Completed { .. } => StatusCode::OK,
        TraceBatch::Rejected { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TraceBatch::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
    };
    (status, Json(batch)).into_response()
}

#[derive(Debug, Deserialize)]
pub(super) struct VlanBody {
    device: String,
    #[serde(flatten)]
    request: VlanChangeRequest,
}

/// POST /api/vlan: `409` carries the ports that need confirmation.
pub(super) async fn vlan_handler<C: Connector>(
    State(state): State<AppState<C>>,
    headers: HeaderMap,
    Json(body): Json<VlanBody>,
) -> axum::response::Response {
    let Some(device) = state.inventory.find_device(&body.device) else {
        return error(StatusCode::NOT_FOUND, format!("unknown device {}", body.device));
    };
    let result = state
        .vlan
        .apply(&device, &body.request, &caller(&headers))
        .await;
    let status = match &result {
        VlanChangeResult::Completed(_) => StatusCode::OK,
        VlanChangeResult::ConfirmationNeeded { .. } => StatusCode::CONFLICT,
        VlanChangeResult::Failed { kind, .. } => match kind.as_str() {
            "validation_error" => StatusCode::BAD_REQUEST,
            "connection_rejected" | "device_overloaded" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        },
    };
    (status, Json(result)).into_response()
}

/// GET /api/load
pub(super) async fn load_handler<C: Connector>(State(state): State<AppState<C>>) -> impl IntoResponse {
    Json(state.load.snapshot())
}

/// GET /api/devices/health
pub(super) async fn health_handler<C: Connector>(State(state): State<AppState<C>>) -> impl IntoResponse {
    Json(state.limiter.snapshot())
}
