//! Session credentials for the HTTP transport.
//!
//! Every `/mcp` request may carry an `Mcp-Session-Id` header and an
//! `Authorization: Bearer <token>` header. [`Credentials`] pulls both out of
//! the request together with the caller's user agent and source address;
//! deciding what they are worth is [`SessionManager`](crate::SessionManager)'s job.
//!
//! Tokens are 256-bit random values. The server keeps only their SHA-256
//! digest and compares digests in constant time.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::sessions::ClientInfo;

/// Request header carrying the session id.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
/// Response header carrying a freshly issued token.
pub const AUTH_TOKEN_HEADER: &str = "mcp-auth-token";

/// SHA-256 of a token. The only form in which tokens are stored.
pub type TokenDigest = [u8; 32];

/// New unguessable session id.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// New 256-bit bearer token, base64url without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn token_digest(token: &str) -> TokenDigest {
    Sha256::digest(token.as_bytes()).into()
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
///
/// Always iterates over the full length of `expected` regardless of `provided`
/// length, so an attacker cannot determine the length from response times.
pub fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mut diff = u8::from(expected.len() != provided.len());
    for (i, e) in expected.iter().enumerate() {
        let p = provided.get(i).copied().unwrap_or(0xff);
        diff |= e ^ p;
    }
    diff == 0
}

/// Whatever identification a request carried.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub session_id: Option<String>,
    pub auth_token: Option<String>,
    pub client: ClientInfo,
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap, source_address: Option<IpAddr>) -> Self {
        let session_id = header_str(headers, SESSION_ID_HEADER).map(str::to_string);
        let auth_token = header_str(headers, AUTHORIZATION.as_str())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let user_agent = header_str(headers, USER_AGENT.as_str()).map(str::to_string);
        Self {
            session_id,
            auth_token,
            client: ClientInfo {
                user_agent,
                source_address,
            },
        }
    }
}

/// Non-empty, trimmed, valid-UTF-8 header value.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for Credentials {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Absent when the router is driven without connect info (tests).
        let source = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Self::from_headers(&parts.headers, source))
    }
}
