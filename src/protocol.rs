//! MCP (Model Context Protocol) JSON-RPC 2.0 codec.
//!
//! Shared by the stdio and HTTP transports. A transport hands every decoded
//! frame to [`handle_message`] and writes back whatever it returns; `None`
//! means the frame was a notification and gets no answer.
//!
//! ## Supported methods
//!
//! | Method                     | Description                      |
//! |----------------------------|----------------------------------|
//! | `initialize`               | Handshake, returns capabilities  |
//! | `tools/list`, `list_tools` | List available tool definitions  |
//! | `tools/call`, `call_tool`  | Execute a tool and return result |
//! | `ping`                     | Liveness check                   |

use serde_json::{json, Value};
use tracing::debug;

use crate::registry::ToolRegistry;

pub const SERVER_NAME: &str = "mcp-tailnet";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Decode one text frame and handle it.
///
/// Unparsable JSON yields a `-32700` error with a `null` id.
pub async fn handle_frame(registry: &ToolRegistry, frame: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(frame) {
        Ok(message) => handle_message(registry, message).await,
        Err(e) => Some(error_response(
            Value::Null,
            PARSE_ERROR,
            format!("Parse error: {e}"),
        )),
    }
}

/// Handle one decoded JSON-RPC message.
pub async fn handle_message(registry: &ToolRegistry, message: Value) -> Option<Value> {
    let Some(request) = message.as_object() else {
        return Some(error_response(
            Value::Null,
            INVALID_REQUEST,
            "Invalid request: expected a JSON object",
        ));
    };

    let id = request.get("id").cloned();
    let Some(method) = request.get("method").and_then(Value::as_str) else {
        return Some(error_response(
            id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            "Invalid request: missing method",
        ));
    };

    // Notifications carry no id and never get an answer.
    let Some(id) = id else {
        debug!("Notification: {method}");
        return None;
    };

    let params = request.get("params").unwrap_or(&Value::Null);
    let response = match method {
        "initialize" => success_response(id, initialize_result()),
        "tools/list" | "list_tools" => {
            success_response(id, json!({ "tools": registry.list_tools() }))
        }
        "tools/call" | "call_tool" => match call_params(params) {
            Ok((name, arguments)) => {
                let result = registry.dispatch(name, &arguments).await;
                success_response(id, result.to_value())
            }
            Err(message) => error_response(id, INVALID_PARAMS, message),
        },
        "ping" => success_response(id, json!({})),
        other => error_response(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ),
    };
    Some(response)
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION
        }
    })
}

/// Pull `name` and `arguments` out of call params. Missing arguments are
/// passed on as `{}`.
fn call_params(params: &Value) -> Result<(&str, Value), String> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or("Invalid params: 'name' must be a string")?;
    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => json!({}),
        Some(args @ Value::Object(_)) => args.clone(),
        Some(_) => return Err("Invalid params: 'arguments' must be an object".to_string()),
    };
    Ok((name, arguments))
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

pub fn error_response(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message.into() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ToolContext, ToolDefinition};
    use crate::result::ToolResult;
    use crate::schema::{Field, Schema};
    use crate::testing::StubBackend;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
    }

    fn registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new(ToolContext::new(Arc::new(StubBackend::default())));
        reg.register(ToolDefinition::new(
            "echo",
            "Echo text back",
            Schema::object().field(Field::string("text").required()),
            |args: EchoArgs, _ctx| async move { Ok(ToolResult::text(args.text)) },
        ));
        reg
    }

    async fn call(message: Value) -> Value {
        handle_message(&registry(), message)
            .await
            .expect("request should get a response")
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let resp = call(json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" })).await;
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(resp["result"]["serverInfo"]["name"], SERVER_NAME);
    }

    #[tokio::test]
    async fn list_tools_alias_matches_tools_list() {
        let a = call(json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" })).await;
        let b = call(json!({ "jsonrpc": "2.0", "id": 1, "method": "list_tools" })).await;
        assert_eq!(a, b);
        assert_eq!(a["result"]["tools"][0]["name"], "echo");
        assert!(a["result"]["tools"][0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn call_tool_returns_result_envelope() {
        let resp = call(json!({
            "jsonrpc": "2.0", "id": "a", "method": "call_tool",
            "params": { "name": "echo", "arguments": { "text": "hi" } }
        }))
        .await;
        assert_eq!(resp["id"], "a");
        assert_eq!(
            resp["result"],
            json!({ "content": [{ "type": "text", "text": "hi" }] })
        );
    }

    #[tokio::test]
    async fn tool_failure_is_a_result_not_an_rpc_error() {
        let resp = call(json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": { "name": "echo", "arguments": {} }
        }))
        .await;
        assert!(resp.get("error").is_none());
        assert_eq!(resp["result"]["isError"], true);
    }

    #[tokio::test]
    async fn malformed_call_params_are_rejected_before_dispatch() {
        let resp = call(json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": { "name": 7 }
        }))
        .await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);

        let resp = call(json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": { "name": "echo", "arguments": "hi" }
        }))
        .await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let resp = handle_message(
            &registry(),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
        )
        .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn unknown_method_and_bad_frames() {
        let resp = call(json!({ "jsonrpc": "2.0", "id": 5, "method": "resources/list" })).await;
        assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);

        let resp = call(json!([1, 2])).await;
        assert_eq!(resp["error"]["code"], INVALID_REQUEST);

        let resp = call(json!({ "id": 6 })).await;
        assert_eq!(resp["error"]["code"], INVALID_REQUEST);
        assert_eq!(resp["id"], 6);

        let resp = handle_frame(&registry(), "{not json").await.unwrap();
        assert_eq!(resp["error"]["code"], PARSE_ERROR);
        assert!(resp["id"].is_null());
    }

    #[tokio::test]
    async fn ping_returns_empty_object() {
        let resp = call(json!({ "jsonrpc": "2.0", "id": 9, "method": "ping" })).await;
        assert_eq!(resp["result"], json!({}));
    }
}
