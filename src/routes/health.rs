//! Unauthenticated health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::protocol::SERVER_NAME;
use crate::AppState;

/// `GET /health` - liveness probe.
///
/// Returns status, version, uptime, tool count and session count. No
/// authentication required, suitable for load-balancer health checks.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    let sessions = state.session_manager.count().await;

    Json(json!({
        "status": "ok",
        "server": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
        "tools": state.registry.len(),
        "sessions": sessions,
    }))
}
