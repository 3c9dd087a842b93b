//! Local node tools: status, up/down, ping, version.

use serde::Deserialize;
use serde_json::{json, Value};

use super::render;
use crate::backend::ConnectOptions;
use crate::registry::ToolDefinition;
use crate::schema::{Field, Schema};

#[derive(Deserialize)]
struct PingArgs {
    target: String,
    count: u32,
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "network_status",
            "Show the local node's connection state, its addresses and the peers it can see.",
            Schema::object(),
            |_args: Value, ctx| async move { render(ctx.backend.network_status().await) },
        ),
        ToolDefinition::new(
            "connect_network",
            "Bring the local node up on the tailnet. Only one connect or disconnect runs at a time.",
            Schema::object()
                .field(Field::string("hostname").non_empty().describe("Hostname to register with."))
                .field(
                    Field::boolean("accept_routes")
                        .default(json!(false))
                        .describe("Accept subnet routes advertised by other nodes."),
                )
                .field(Field::boolean("accept_dns").describe("Use the tailnet's DNS settings."))
                .field(
                    Field::string_array("advertise_routes")
                        .describe("Subnet routes to advertise, e.g. [\"10.0.0.0/24\"]."),
                )
                .field(
                    Field::string_array("advertise_tags")
                        .describe("ACL tags to request, e.g. [\"tag:server\"]."),
                )
                .field(Field::string("exit_node").non_empty().describe("Exit node IP or name."))
                .field(
                    Field::string("auth_key")
                        .non_empty()
                        .describe("Pre-authentication key for unattended login."),
                ),
            |args: ConnectOptions, ctx| async move { render(ctx.backend.connect(&args).await) },
        ),
        ToolDefinition::new(
            "disconnect_network",
            "Take the local node off the tailnet.",
            Schema::object(),
            |_args: Value, ctx| async move { render(ctx.backend.disconnect().await) },
        ),
        ToolDefinition::new(
            "ping_peer",
            "Ping a peer over the tailnet and report latency and the path taken (direct or relayed).",
            Schema::object()
                .field(
                    Field::string("target")
                        .required()
                        .non_empty()
                        .describe("Peer hostname or tailnet IP."),
                )
                .field(
                    Field::integer("count")
                        .default(json!(4))
                        .range(1, 100)
                        .describe("Number of pings (default 4)."),
                ),
            |args: PingArgs, ctx| async move {
                render(ctx.backend.ping_peer(&args.target, args.count).await)
            },
        ),
        ToolDefinition::new(
            "get_version",
            "Report the installed client version.",
            Schema::object(),
            |_args: Value, ctx| async move { render(ctx.backend.version().await) },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ToolContext, ToolRegistry};
    use crate::testing::StubBackend;
    use std::sync::Arc;

    fn setup() -> (ToolRegistry, Arc<StubBackend>) {
        let backend = Arc::new(StubBackend::default());
        let mut reg = ToolRegistry::new(ToolContext::new(backend.clone()));
        for tool in definitions() {
            reg.register(tool);
        }
        (reg, backend)
    }

    #[tokio::test]
    async fn ping_uses_default_count() {
        let (reg, backend) = setup();
        let result = reg.dispatch("ping_peer", &json!({ "target": "nas" })).await;
        assert!(!result.is_error);
        assert_eq!(backend.calls(), ["ping_peer nas 4"]);
    }

    #[tokio::test]
    async fn ping_rejects_out_of_range_count() {
        let (reg, backend) = setup();
        let result = reg
            .dispatch("ping_peer", &json!({ "target": "nas", "count": 0 }))
            .await;
        assert!(result.is_error);
        assert!(result.joined_text().contains("count"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn connect_forwards_options() {
        let (reg, backend) = setup();
        let result = reg
            .dispatch("connect_network", &json!({ "hostname": "ci-runner" }))
            .await;
        assert!(!result.is_error);
        assert_eq!(backend.calls(), ["connect Some(\"ci-runner\")"]);
    }
}
