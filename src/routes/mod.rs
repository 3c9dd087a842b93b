//! HTTP route handlers and router assembly.
//!
//! | Method | Path        | Auth                        |
//! |--------|-------------|-----------------------------|
//! | POST   | `/mcp`      | session (created when none) |
//! | GET    | `/mcp`      | session                     |
//! | DELETE | `/mcp`      | session                     |
//! | GET    | `/health`   | none                        |
//! | GET    | `/tools`    | none                        |
//! | GET    | `/sessions` | none; only with `debug_endpoints` |
//!
//! CORS preflight is answered by the CORS layer before any handler runs.

pub mod health;
pub mod mcp;
pub mod sessions;
pub mod tools;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AUTH_TOKEN_HEADER, SESSION_ID_HEADER};
use crate::config::HttpConfig;
use crate::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/tools", get(tools::list_tools))
        .route(
            "/mcp",
            get(mcp::get_mcp).post(mcp::post_mcp).delete(mcp::delete_mcp),
        );

    if state.config.session.debug_endpoints {
        info!("Debug endpoints enabled: GET /sessions");
        app = app.route("/sessions", get(sessions::list_sessions));
    }

    app.layer(GlobalConcurrencyLimitLayer::new(
        state.config.server.max_concurrent_requests,
    ))
    .layer(cors_layer(&state.config.http))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

fn cors_layer(config: &HttpConfig) -> CorsLayer {
    let session_header = HeaderName::from_static(SESSION_ID_HEADER);
    let token_header = HeaderName::from_static(AUTH_TOKEN_HEADER);

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, session_header.clone()])
        .expose_headers([session_header, token_header]);

    if config.allowed_origin == "*" {
        return layer.allow_origin(AllowOrigin::any());
    }
    match HeaderValue::from_str(&config.allowed_origin) {
        Ok(origin) => layer.allow_origin(AllowOrigin::exact(origin)),
        Err(_) => {
            warn!(
                "Ignoring invalid allowed_origin {:?}; cross-origin requests will be refused",
                config.allowed_origin
            );
            layer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::{ToolContext, ToolDefinition, ToolRegistry};
    use crate::result::ToolResult;
    use crate::schema::{Field, Schema};
    use crate::testing::StubBackend;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
    }

    fn state_with(config: Config) -> AppState {
        let mut registry = ToolRegistry::new(ToolContext::new(Arc::new(StubBackend::default())));
        registry.register(ToolDefinition::new(
            "echo",
            "Echo text back",
            Schema::object().field(Field::string("text").required()),
            |args: EchoArgs, _ctx| async move { Ok(ToolResult::text(args.text)) },
        ));
        AppState::new(Arc::new(config), Arc::new(registry))
    }

    fn state() -> AppState {
        state_with(Config::default())
    }

    fn echo_call(id: u64, text: &str) -> String {
        json!({
            "jsonrpc": "2.0", "id": id, "method": "tools/call",
            "params": { "name": "echo", "arguments": { "text": text } }
        })
        .to_string()
    }

    fn post(body: String, session: Option<&str>, token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json");
        if let Some(id) = session {
            req = req.header(SESSION_ID_HEADER, id);
        }
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        req.body(Body::from(body)).unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn header(resp: &Response, name: &str) -> String {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap()
    }

    #[tokio::test]
    async fn create_reuse_then_forged_token() {
        let state = state();
        let app = router(state.clone());

        let resp = app
            .clone()
            .oneshot(post(echo_call(1, "hi"), None, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let session_id = header(&resp, SESSION_ID_HEADER);
        let token = header(&resp, AUTH_TOKEN_HEADER);
        let body = body_json(resp).await;
        assert_eq!(body["result"]["content"][0]["text"], "hi");

        let resp = app
            .clone()
            .oneshot(post(echo_call(2, "again"), Some(&session_id), Some(&token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(AUTH_TOKEN_HEADER).is_none());
        assert_eq!(body_json(resp).await["id"], 2);

        let resp = app
            .oneshot(post(echo_call(3, "x"), Some(&session_id), Some("forged")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "INVALID_SESSION");
        assert!(body["error"].is_string());

        assert_eq!(state.session_manager.count().await, 1);
    }

    #[tokio::test]
    async fn partial_credentials_get_400() {
        let state = state();
        let app = router(state.clone());

        let resp = app
            .clone()
            .oneshot(post(echo_call(1, "hi"), Some("some-id"), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "MISSING_CREDENTIALS");

        let resp = app
            .oneshot(post(echo_call(1, "hi"), None, Some("tok")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.session_manager.count().await, 0);
    }

    #[tokio::test]
    async fn notification_is_accepted_without_body() {
        let app = router(state());
        let note = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        let resp = app.oneshot(post(note.to_string(), None, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert!(resp.headers().get(SESSION_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let app = router(state());
        let resp = app
            .oneshot(post("{oops".to_string(), None, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn event_stream_requires_both_credentials() {
        let app = router(state());
        let req = Request::builder()
            .method("GET")
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn event_stream_delivers_pushed_messages() {
        let state = state();
        let app = router(state.clone());
        let issued = state.session_manager.create(Default::default()).await;

        let req = Request::builder()
            .method("GET")
            .uri("/mcp")
            .header(SESSION_ID_HEADER, &issued.session_id)
            .header("authorization", format!("Bearer {}", issued.auth_token))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(header(&resp, "content-type"), "text/event-stream");

        state
            .session_manager
            .notify(&issued.session_id, json!({ "jsonrpc": "2.0", "method": "ping" }))
            .await;
        state.session_manager.close(&issued.session_id).await;

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("event: message"));
        assert!(text.contains(r#""method":"ping""#));
    }

    #[tokio::test]
    async fn delete_closes_the_session() {
        let state = state();
        let app = router(state.clone());
        let issued = state.session_manager.create(Default::default()).await;

        let req = Request::builder()
            .method("DELETE")
            .uri("/mcp")
            .header(SESSION_ID_HEADER, &issued.session_id)
            .header("authorization", format!("Bearer {}", issued.auth_token))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.session_manager.count().await, 0);

        let resp = app
            .oneshot(post(
                echo_call(1, "hi"),
                Some(&issued.session_id),
                Some(&issued.auth_token),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_and_tools_need_no_session() {
        let state = state();
        let app = router(state.clone());

        let resp = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["tools"], 1);
        assert_eq!(body["sessions"], 0);

        let resp = app
            .oneshot(Request::get("/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["tools"][0]["name"], "echo");
        assert_eq!(state.session_manager.count().await, 0);
    }

    #[tokio::test]
    async fn sessions_endpoint_is_debug_only() {
        let resp = router(state())
            .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let mut config = Config::default();
        config.session.debug_endpoints = true;
        let state = state_with(config);
        let issued = state.session_manager.create(Default::default()).await;
        let resp = router(state)
            .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["sessions"][0]["session_id"], issued.session_id.as_str());
        assert!(!body.to_string().contains(&issued.auth_token));
    }

    #[tokio::test]
    async fn preflight_skips_session_logic() {
        let state = state();
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/mcp")
            .header("origin", "https://agent.example")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert!(resp.status().is_success());
        assert_eq!(header(&resp, "access-control-allow-origin"), "*");
        assert_eq!(state.session_manager.count().await, 0);
    }
}
