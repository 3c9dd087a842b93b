//! The MCP endpoint: `POST`, `GET` (event stream) and `DELETE` on `/mcp`.
//!
//! Every request goes through [`SessionManager::authorize`] before any
//! protocol work. Only `POST` may create a session; the new credentials come
//! back in the `Mcp-Session-Id` and `Mcp-Auth-Token` response headers.
//!
//! [`SessionManager::authorize`]: crate::sessions::SessionManager::authorize

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::auth::{Credentials, AUTH_TOKEN_HEADER, SESSION_ID_HEADER};
use crate::protocol;
use crate::sessions::{SessionError, SessionGrant};
use crate::AppState;

/// `POST /mcp` - one JSON-RPC message per request.
///
/// Answers `200` with the JSON-RPC response, or `202` with an empty body
/// when the message was a notification.
pub async fn post_mcp(
    State(state): State<AppState>,
    credentials: Credentials,
    body: Bytes,
) -> Response {
    let grant = match state.session_manager.authorize(&credentials, true).await {
        Ok(grant) => grant,
        Err(e) => return e.into_response(),
    };

    let reply = match std::str::from_utf8(&body) {
        Ok(frame) => protocol::handle_frame(&state.registry, frame).await,
        Err(e) => Some(protocol::error_response(
            serde_json::Value::Null,
            protocol::PARSE_ERROR,
            format!("Parse error: body is not UTF-8: {e}"),
        )),
    };

    let headers = grant_headers(&grant);
    match reply {
        Some(response) => (StatusCode::OK, headers, Json(response)).into_response(),
        None => (StatusCode::ACCEPTED, headers).into_response(),
    }
}

/// `GET /mcp` - server-push event stream for an existing session.
///
/// The stream ends when the session is closed or expires.
pub async fn get_mcp(State(state): State<AppState>, credentials: Credentials) -> Response {
    let session_id = match state.session_manager.authorize(&credentials, false).await {
        Ok(grant) => grant.session_id().to_string(),
        Err(e) => return e.into_response(),
    };
    let Some(rx) = state.session_manager.subscribe(&session_id).await else {
        return SessionError::InvalidSession.into_response();
    };
    debug!("Event stream opened for session {session_id}");

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(value) => {
                let data = serde_json::to_string(&value).unwrap_or_default();
                let event = Event::default().event("message").data(data);
                Some((Ok::<_, Infallible>(event), rx))
            }
            Err(RecvError::Lagged(n)) => {
                let event = Event::default()
                    .event("error")
                    .data(format!(r#"{{"code":"LAGGED","missed":{n}}}"#));
                Some((Ok(event), rx))
            }
            Err(RecvError::Closed) => None,
        }
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default().interval(Duration::from_secs(15)))
        .into_response()
}

/// `DELETE /mcp` - close a session explicitly.
pub async fn delete_mcp(State(state): State<AppState>, credentials: Credentials) -> Response {
    match state.session_manager.authorize(&credentials, false).await {
        Ok(grant) => {
            state.session_manager.close(grant.session_id()).await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Response headers identifying the session; the token only on creation.
fn grant_headers(grant: &SessionGrant) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(grant.session_id()) {
        headers.insert(SESSION_ID_HEADER, value);
    }
    if let SessionGrant::Created(issued) = grant {
        if let Ok(value) = HeaderValue::from_str(&issued.auth_token) {
            headers.insert(AUTH_TOKEN_HEADER, value);
        }
    }
    headers
}
