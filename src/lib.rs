#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_async)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! mcp-tailnet library: exposes tailnet management to AI agents over MCP.
//!
//! Build a [`ToolRegistry`] once, then hand it to either transport:
//! - `stdio` - one trusted caller over stdin/stdout
//! - `server` - many callers over HTTP, each in its own authenticated session
//!
//! ## Architecture
//!
//! ```text
//! main.rs        - entry point, clap subcommands, logging setup
//! config.rs      - TOML file / env-var configuration
//! schema.rs      - declarative argument schemas (validate + describe)
//! result.rs      - tool result envelope
//! registry.rs    - tool definitions, validation, dispatch, panic containment
//! protocol.rs    - JSON-RPC 2.0 codec shared by both transports
//! stdio.rs       - single-stream transport
//! auth.rs        - token generation, digests, credential extraction
//! sessions/      - SessionManager (create, validate, sweep, close)
//! routes/        - axum handlers and router assembly
//! server.rs      - HTTP bind/serve, sweep task, graceful shutdown
//! backend/       - API + CLI clients behind the Backend trait
//! tools/         - the built-in tool catalogue
//! ```

pub mod auth;
pub mod backend;
pub mod config;
pub mod protocol;
pub mod registry;
pub mod result;
pub mod routes;
pub mod schema;
pub mod server;
pub mod sessions;
pub mod state;
pub mod stdio;
pub mod tools;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use backend::{Backend, BackendResponse, UnifiedBackend};
pub use config::Config;
pub use registry::{ToolContext, ToolDefinition, ToolRegistry};
pub use result::ToolResult;
pub use sessions::SessionManager;
pub use state::AppState;
