//! Operator control HTTP server.
//!
//! A small axum API for inspecting and changing the gate while the engine
//! runs.
//!
//! ## Endpoints
//!
//! - `GET /health`: liveness check
//! - `GET /config`: current risk limits as JSON
//! - `PUT /config?token=<TOKEN>`: replace and persist the limits (requires auth token)
//! - `GET /counters`: flow, trade, and cancel counters

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use rg_core::config::RiskConfig;

use crate::counters::CounterSnapshot;
use crate::gate::RiskGate;

/// Shared state for control handlers.
pub struct ControlState {
    pub gate: Arc<RiskGate>,
    /// Token required to change limits. If `None`, updates are disabled.
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build the control router.
pub fn control_router(state: Arc<ControlState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config", get(get_config_handler).put(put_config_handler))
        .route("/counters", get(counters_handler))
        .with_state(state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn get_config_handler(State(state): State<Arc<ControlState>>) -> Json<RiskConfig> {
    Json(state.gate.get_config())
}

/// `PUT /config?token=<TOKEN>`: validate, apply, and persist new limits.
async fn put_config_handler(
    State(state): State<Arc<ControlState>>,
    Query(query): Query<TokenQuery>,
    Json(config): Json<RiskConfig>,
) -> Result<Json<RiskConfig>, (StatusCode, Json<ErrorResponse>)> {
    let expected = state.token.as_ref().ok_or_else(|| {
        error_response(StatusCode::FORBIDDEN, "config updates are disabled")
    })?;
    if query.token.as_ref() != Some(expected) {
        return Err(error_response(StatusCode::UNAUTHORIZED, "invalid token"));
    }

    state.gate.update_config(config).map_err(|e| {
        tracing::warn!(error = %e, "config update refused");
        error_response(StatusCode::BAD_REQUEST, &e.to_string())
    })?;
    tracing::info!("risk config updated via control API");
    Ok(Json(state.gate.get_config()))
}

async fn counters_handler(State(state): State<Arc<ControlState>>) -> Json<CounterSnapshot> {
    Json(state.gate.counters().snapshot())
}

fn error_response(status: StatusCode, msg: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
}
