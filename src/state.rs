//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::registry::ToolRegistry;
use crate::sessions::SessionManager;

/// Shared state for the HTTP transport.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// The tool registry, frozen after startup and shared by every session.
    pub registry: Arc<ToolRegistry>,
    /// Sole owner of the session table.
    pub session_manager: SessionManager,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Arc<Config>, registry: Arc<ToolRegistry>) -> Self {
        let session_manager = SessionManager::from_config(&config.session);
        Self {
            config,
            registry,
            session_manager,
            start_time: Instant::now(),
        }
    }
}
