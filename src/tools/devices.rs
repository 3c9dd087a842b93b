//! Device inventory and authorization tools.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{render, DEVICE_ID_DESCRIPTION};
use crate::registry::ToolDefinition;
use crate::schema::{Field, Schema};

#[derive(Deserialize)]
struct DeviceArgs {
    device_id: String,
}

#[derive(Deserialize)]
struct AuthorizeArgs {
    device_id: String,
    authorized: bool,
}

#[derive(Deserialize)]
struct TagsArgs {
    device_id: String,
    tags: Vec<String>,
}

fn device_id_field() -> Field {
    Field::string("device_id")
        .required()
        .non_empty()
        .describe(DEVICE_ID_DESCRIPTION)
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "list_devices",
            "List every device in the tailnet with its addresses, OS, last-seen time and authorization state.",
            Schema::object(),
            |_args: Value, ctx| async move { render(ctx.backend.list_devices().await) },
        ),
        ToolDefinition::new(
            "get_device",
            "Get full details for one device.",
            Schema::object().field(device_id_field()),
            |args: DeviceArgs, ctx| async move {
                render(ctx.backend.get_device(&args.device_id).await)
            },
        ),
        ToolDefinition::new(
            "authorize_device",
            "Authorize a device to join the tailnet, or revoke its authorization.",
            Schema::object().field(device_id_field()).field(
                Field::boolean("authorized")
                    .default(json!(true))
                    .describe("true to authorize (default), false to revoke."),
            ),
            |args: AuthorizeArgs, ctx| async move {
                render(
                    ctx.backend
                        .authorize_device(&args.device_id, args.authorized)
                        .await,
                )
            },
        ),
        ToolDefinition::new(
            "delete_device",
            "Remove a device from the tailnet. The device must re-authenticate to rejoin.",
            Schema::object().field(device_id_field()),
            |args: DeviceArgs, ctx| async move {
                render(ctx.backend.delete_device(&args.device_id).await)
            },
        ),
        ToolDefinition::new(
            "set_device_tags",
            "Replace a device's ACL tags. Tags must use the `tag:` prefix; an empty list clears them.",
            Schema::object().field(device_id_field()).field(
                Field::string_array("tags")
                    .required()
                    .describe("Tags such as [\"tag:server\"]."),
            ),
            |args: TagsArgs, ctx| async move {
                render(ctx.backend.set_device_tags(&args.device_id, &args.tags).await)
            },
        ),
    ]
}
