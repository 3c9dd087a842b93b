//! Tool catalogue.
//!
//! ## Tool categories
//!
//! **Device tools** go through the control-plane API:
//! - `list_devices`, `get_device`
//! - `authorize_device`, `delete_device`, `set_device_tags`
//!
//! **Network tools** drive the local node through the CLI:
//! - `network_status`, `connect_network`, `disconnect_network`
//! - `ping_peer`, `get_version`
//!
//! Handlers are thin: call the backend, render `data` as pretty JSON, and
//! let the registry turn any error into an `isError` result.

mod devices;
mod network;

use serde_json::Value;

use crate::backend::BackendResponse;
use crate::registry::{ToolError, ToolRegistry};
use crate::result::ToolResult;

/// Register every built-in tool.
pub fn register_all(registry: &mut ToolRegistry) {
    for tool in devices::definitions()
        .into_iter()
        .chain(network::definitions())
    {
        registry.register(tool);
    }
}

/// Description shared by every `device_id` field.
const DEVICE_ID_DESCRIPTION: &str =
    "Device ID as returned by list_devices (the `id` or `nodeId` field).";

/// Turn a backend envelope into a tool result.
fn render(response: BackendResponse) -> Result<ToolResult, ToolError> {
    let data = response.into_result()?;
    Ok(match data {
        Value::String(text) => ToolResult::text(text),
        other => ToolResult::json(&other),
    })
}
