//! Session introspection, mounted only when `session.debug_endpoints` is on.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// `GET /sessions` - ids, timestamps and client info. Never tokens.
pub async fn list_sessions(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.session_manager.list().await;
    Json(json!({
        "count": sessions.len(),
        "inactivity_timeout_secs": state.session_manager.inactivity_timeout().as_secs(),
        "sessions": sessions,
    }))
}
