//! Shared fixtures: a backend that never leaves the process and a registry
//! carrying an `echo` tool.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use mcp_tailnet::backend::{Backend, BackendResponse, ConnectOptions};
use mcp_tailnet::schema::{Field, Schema};
use mcp_tailnet::{tools, ToolContext, ToolDefinition, ToolRegistry, ToolResult};

pub struct OfflineBackend;

#[async_trait]
impl Backend for OfflineBackend {
    async fn list_devices(&self) -> BackendResponse {
        BackendResponse::ok(json!([{ "id": "n1", "hostname": "nas" }]))
    }
    async fn get_device(&self, device_id: &str) -> BackendResponse {
        BackendResponse::ok(json!({ "id": device_id }))
    }
    async fn authorize_device(&self, device_id: &str, authorized: bool) -> BackendResponse {
        BackendResponse::ok(json!({ "id": device_id, "authorized": authorized }))
    }
    async fn delete_device(&self, _device_id: &str) -> BackendResponse {
        BackendResponse::err("API error (HTTP 404): device not found")
    }
    async fn set_device_tags(&self, device_id: &str, tags: &[String]) -> BackendResponse {
        BackendResponse::ok(json!({ "id": device_id, "tags": tags }))
    }
    async fn network_status(&self) -> BackendResponse {
        BackendResponse::ok(json!({ "BackendState": "Stopped" }))
    }
    async fn connect(&self, _options: &ConnectOptions) -> BackendResponse {
        BackendResponse::ok(json!({ "connected": true }))
    }
    async fn disconnect(&self) -> BackendResponse {
        BackendResponse::ok(json!({ "connected": false }))
    }
    async fn ping_peer(&self, target: &str, count: u32) -> BackendResponse {
        BackendResponse::ok(json!({ "target": target, "count": count }))
    }
    async fn version(&self) -> BackendResponse {
        BackendResponse::ok(json!("1.0.0"))
    }
}

#[derive(Deserialize)]
struct EchoArgs {
    text: String,
}

pub fn echo_tool() -> ToolDefinition {
    ToolDefinition::new(
        "echo",
        "Echo text back",
        Schema::object().field(Field::string("text").required()),
        |args: EchoArgs, _ctx| async move { Ok(ToolResult::text(args.text)) },
    )
}

/// Built-in catalogue plus `echo`, over [`OfflineBackend`].
pub fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new(ToolContext::new(Arc::new(OfflineBackend)));
    tools::register_all(&mut registry);
    registry.register(echo_tool());
    registry
}
