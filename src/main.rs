//! # mcp-tailnet
//!
//! MCP (Model Context Protocol) server that lets AI agents inspect and manage
//! a tailnet: list and authorize devices, set tags, bring the local node up
//! or down, ping peers.
//!
//! ## Subcommands
//!
//! - `mcp-tailnet stdio` (default) - serve one agent over stdin/stdout
//! - `mcp-tailnet http` - serve many agents over HTTP with per-client sessions
//!
//! Logs always go to stderr so stdout stays clean for protocol frames.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mcp_tailnet::config::Config;
use mcp_tailnet::{server, stdio, tools, ToolContext, ToolRegistry, UnifiedBackend};

/// MCP server for tailnet management.
#[derive(Parser)]
#[command(name = "mcp-tailnet", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a single client over stdin/stdout (default when no subcommand given).
    Stdio {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
    /// Serve multiple clients over HTTP.
    Http {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
        /// Listen address, overrides config and environment.
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Http { config, listen }) => run_http(config.as_deref(), listen).await,
        Some(Commands::Stdio { config }) => run_stdio(config.as_deref()).await,
        None => run_stdio(None).await,
    }
}

async fn run_stdio(config_path: Option<&str>) -> ExitCode {
    let Some(config) = startup(config_path) else {
        return ExitCode::FAILURE;
    };
    let Some(registry) = build_registry(&config) else {
        return ExitCode::FAILURE;
    };

    match stdio::run_stdio(&registry).await {
        Ok(()) => {
            info!("Goodbye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("stdio transport failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_http(config_path: Option<&str>, listen: Option<String>) -> ExitCode {
    let Some(mut config) = startup(config_path) else {
        return ExitCode::FAILURE;
    };
    if let Some(listen) = listen {
        config.server.listen = listen;
    }
    let Some(registry) = build_registry(&config) else {
        return ExitCode::FAILURE;
    };

    match server::run_http(Arc::new(config), Arc::new(registry)).await {
        Ok(()) => {
            info!("Goodbye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("HTTP transport failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Load config and initialize tracing. Config errors are printed directly
/// since logging isn't up yet.
fn startup(config_path: Option<&str>) -> Option<Config> {
    let config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mcp-tailnet: configuration error: {e}");
            return None;
        }
    };

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_filter))
        .with_writer(std::io::stderr)
        .init();

    info!("mcp-tailnet v{} starting", env!("CARGO_PKG_VERSION"));
    Some(config)
}

fn build_registry(config: &Config) -> Option<ToolRegistry> {
    let backend = match UnifiedBackend::from_config(&config.backend) {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to initialize backend: {e}");
            return None;
        }
    };
    if !backend.has_api() {
        warn!("No API key configured; device tools will report an error (set TAILSCALE_API_KEY)");
    }

    let mut registry = ToolRegistry::new(ToolContext::new(Arc::new(backend)));
    tools::register_all(&mut registry);
    info!("{} tools registered", registry.len());
    Some(registry)
}
