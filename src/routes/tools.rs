//! `GET /tools` - read-only mirror of `tools/list`, no session needed.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "tools": state.registry.list_tools() }))
}
