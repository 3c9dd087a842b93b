//! HTTP session lifecycle: creation, credential checks, expiry.
//!
//! [`SessionManager`] is the single owner of the session table. Nothing
//! else touches it; routes go through [`SessionManager::authorize`] and
//! friends.
//!
//! ## Credential rules
//!
//! | session id | token   | outcome                                  |
//! |------------|---------|------------------------------------------|
//! | absent     | absent  | create a session (when creation allowed) |
//! | present    | present | validate, then refresh `last_accessed`   |
//! | only one of the two  || `400 MISSING_CREDENTIALS`               |
//!
//! Unknown sessions, token mismatches, expired sessions and (when enabled)
//! source-address mismatches all answer `401 INVALID_SESSION`; only the log
//! says which check failed.
//!
//! ## Concurrency
//!
//! The table is behind an `RwLock`. Every operation holds the lock only for
//! map work; no I/O happens under it.

pub mod session;

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::{generate_session_id, generate_token, token_digest, Credentials};
use crate::config::SessionConfig;
pub use session::ClientInfo;
use session::Session;

/// Credential failures on the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Both Mcp-Session-Id and Authorization headers are required")]
    MissingCredentials,
    #[error("Invalid or expired session")]
    InvalidSession,
}

impl SessionError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredentials => StatusCode::BAD_REQUEST,
            Self::InvalidSession => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "MISSING_CREDENTIALS",
            Self::InvalidSession => "INVALID_SESSION",
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({ "error": self.to_string(), "code": self.code() })),
        )
            .into_response()
    }
}

/// Identifiers handed out once, on the request that created the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredentials {
    pub session_id: String,
    pub auth_token: String,
}

/// Outcome of a successful [`SessionManager::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionGrant {
    /// A new session; the caller must return these credentials.
    Created(IssuedCredentials),
    /// An existing session, already touched.
    Resumed(String),
}

impl SessionGrant {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Created(issued) => &issued.session_id,
            Self::Resumed(id) => id,
        }
    }
}

/// Session summary for introspection. Never carries the token.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    /// Epoch milliseconds.
    pub created_at: u64,
    pub idle_secs: u64,
    pub user_agent: Option<String>,
    pub source_address: Option<IpAddr>,
}

/// Owns every live HTTP session.
///
/// Cloneable; all clones share the same table.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    inactivity_timeout: Duration,
    check_source_address: bool,
}

impl SessionManager {
    pub fn new(inactivity_timeout: Duration, check_source_address: bool) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            inactivity_timeout,
            check_source_address,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.inactivity_timeout(), config.check_source_address)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    /// Apply the credential rules to one request.
    ///
    /// With `allow_create` false (event streams, explicit close) a request
    /// with no credentials at all is also `MissingCredentials`.
    pub async fn authorize(
        &self,
        credentials: &Credentials,
        allow_create: bool,
    ) -> Result<SessionGrant, SessionError> {
        match (&credentials.session_id, &credentials.auth_token) {
            (None, None) if allow_create => {
                let issued = self.create(credentials.client.clone()).await;
                Ok(SessionGrant::Created(issued))
            }
            (Some(id), Some(token)) => {
                self.validate(id, token, credentials.client.source_address)
                    .await?;
                Ok(SessionGrant::Resumed(id.clone()))
            }
            _ => {
                debug!("Rejected request with partial credentials");
                Err(SessionError::MissingCredentials)
            }
        }
    }

    /// Create a session and issue its credentials.
    pub async fn create(&self, client_info: ClientInfo) -> IssuedCredentials {
        let session_id = generate_session_id();
        let auth_token = generate_token();
        let session = Session::new(session_id.clone(), token_digest(&auth_token), client_info);

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), session);
        debug!(
            "Created session {session_id}, active: {}",
            sessions.len()
        );

        IssuedCredentials {
            session_id,
            auth_token,
        }
    }

    /// Check a session id / token pair and refresh `last_accessed`.
    ///
    /// Nothing is refreshed on failure. A session found expired here is
    /// removed on the spot instead of waiting for the sweep.
    pub async fn validate(
        &self,
        session_id: &str,
        auth_token: &str,
        source_address: Option<IpAddr>,
    ) -> Result<(), SessionError> {
        let digest = token_digest(auth_token);
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let Some(session) = sessions.get_mut(session_id) else {
            debug!("Unknown session {session_id}");
            return Err(SessionError::InvalidSession);
        };

        if !session.token_matches(&digest) {
            warn!(
                session_id,
                source = ?source_address,
                "Auth token mismatch"
            );
            return Err(SessionError::InvalidSession);
        }

        if session.is_expired(now, self.inactivity_timeout) {
            sessions.remove(session_id);
            info!("Session {session_id} expired before use; removed");
            return Err(SessionError::InvalidSession);
        }

        if self.check_source_address {
            if let (Some(recorded), Some(current)) =
                (session.client_info.source_address, source_address)
            {
                if recorded != current {
                    warn!(
                        session_id,
                        recorded = %recorded,
                        source = %current,
                        "Source address mismatch"
                    );
                    return Err(SessionError::InvalidSession);
                }
            }
        }

        session.touch();
        Ok(())
    }

    /// Refresh `last_accessed` without a credential check. Returns false if
    /// the session does not exist.
    pub async fn touch(&self, session_id: &str) -> bool {
        match self.sessions.write().await.get_mut(session_id) {
            Some(session) => {
                session.touch();
                true
            }
            None => false,
        }
    }

    /// Remove every session idle for longer than the inactivity timeout.
    /// Returns the removed ids.
    pub async fn sweep(&self) -> Vec<String> {
        {
            let sessions = self.sessions.read().await;
            if sessions.is_empty() {
                return Vec::new();
            }
        }

        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| s.is_expired(now, self.inactivity_timeout))
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            info!(
                "Swept {} expired session(s), remaining: {}",
                expired.len(),
                sessions.len()
            );
        }
        expired
    }

    /// Remove a session immediately. Returns false if it was not there.
    pub async fn close(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(session_id).is_some();
        if removed {
            info!(
                "Closed session {session_id}, remaining: {}",
                sessions.len()
            );
        }
        removed
    }

    /// Remove every session, ending all open event streams. Returns how
    /// many were dropped.
    pub async fn close_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let dropped = sessions.len();
        sessions.clear();
        dropped
    }

    /// Subscribe to a session's server-push channel.
    pub async fn subscribe(&self, session_id: &str) -> Option<broadcast::Receiver<Value>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(Session::subscribe)
    }

    /// Push a message to a session's open event streams. Returns `None` if
    /// the session does not exist, otherwise how many streams received it.
    pub async fn notify(&self, session_id: &str, message: Value) -> Option<usize> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.push(message))
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Summaries of all sessions, oldest first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let now = Instant::now();
        let sessions = self.sessions.read().await;
        let mut items: Vec<SessionSummary> = sessions
            .values()
            .map(|s| SessionSummary {
                session_id: s.id.clone(),
                created_at: s.created_at,
                idle_secs: s.idle_for(now).as_secs(),
                user_agent: s.client_info.user_agent.clone(),
                source_address: s.client_info.source_address,
            })
            .collect();
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        items
    }
}
