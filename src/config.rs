//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** - see [`Config::apply_env`]
//! 2. **Config file** - path via `--config <path>`, or `mcp-tailnet.toml` in CWD
//! 3. **Compiled defaults** - see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8931"
//! max_concurrent_requests = 64
//!
//! [session]
//! inactivity_timeout_secs = 1800
//! sweep_interval_secs = 300
//! check_source_address = false
//! debug_endpoints = false
//!
//! [http]
//! allowed_origin = "*"
//!
//! [backend]
//! api_base_url = "https://api.tailscale.com/api/v2"
//! api_key = "tskey-api-..."
//! tailnet = "-"
//! cli_path = "tailscale"
//! api_timeout_ms = 30000
//! cli_timeout_ms = 30000
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "mcp-tailnet.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings (ignored by the stdio transport).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `127.0.0.1:8931`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Requests processed concurrently before callers queue (default 64).
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

/// HTTP session lifecycle settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Seconds without a validated request before a session expires (default 1800).
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,
    /// Seconds between expiry sweeps (default 300).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Reject requests whose source address differs from the one recorded at
    /// session creation. Off by default; enable for hardened deployments.
    #[serde(default)]
    pub check_source_address: bool,
    /// Mount `GET /sessions`. Never enable in production.
    #[serde(default)]
    pub debug_endpoints: bool,
}

/// Browser-facing HTTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// `Access-Control-Allow-Origin` value. `"*"` allows any origin.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

/// Settings for the API and CLI backends.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// API access token. Empty disables device (API) operations.
    #[serde(default)]
    pub api_key: String,
    /// Tailnet name; `-` means the token's default tailnet.
    #[serde(default = "default_tailnet")]
    pub tailnet: String,
    /// Path or name of the CLI binary.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
    #[serde(default = "default_timeout_ms")]
    pub api_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub cli_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("{0}")]
    Invalid(String),
}

fn default_listen() -> String {
    "127.0.0.1:8931".to_string()
}
fn default_max_concurrent_requests() -> usize {
    64
}
fn default_inactivity_timeout() -> u64 {
    1800
}
fn default_sweep_interval() -> u64 {
    300
}
fn default_allowed_origin() -> String {
    "*".to_string()
}
fn default_api_base_url() -> String {
    "https://api.tailscale.com/api/v2".to_string()
}
fn default_tailnet() -> String {
    "-".to_string()
}
fn default_cli_path() -> String {
    "tailscale".to_string()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: default_inactivity_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            check_source_address: false,
            debug_endpoints: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            allowed_origin: default_allowed_origin(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: String::new(),
            tailnet: default_tailnet(),
            cli_path: default_cli_path(),
            api_timeout_ms: default_timeout_ms(),
            cli_timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file must exist. Otherwise `mcp-tailnet.toml`
    /// in the current directory is used when present.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment overrides. `lookup` is injected so tests don't touch
    /// the process environment.
    ///
    /// | Variable                    | Field                              |
    /// |-----------------------------|------------------------------------|
    /// | `MCP_TAILNET_LISTEN`        | `server.listen`                    |
    /// | `MCP_SESSION_TIMEOUT_SECS`  | `session.inactivity_timeout_secs`  |
    /// | `MCP_SESSION_SWEEP_SECS`    | `session.sweep_interval_secs`      |
    /// | `MCP_CHECK_SOURCE_ADDRESS`  | `session.check_source_address`     |
    /// | `MCP_DEBUG_ENDPOINTS`       | `session.debug_endpoints`          |
    /// | `MCP_ALLOWED_ORIGIN`        | `http.allowed_origin`              |
    /// | `TAILSCALE_API_KEY`         | `backend.api_key`                  |
    /// | `TAILSCALE_TAILNET`         | `backend.tailnet`                  |
    /// | `TAILSCALE_API_URL`         | `backend.api_base_url`             |
    /// | `TAILSCALE_CLI_PATH`        | `backend.cli_path`                 |
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(listen) = lookup("MCP_TAILNET_LISTEN") {
            self.server.listen = listen;
        }
        if let Some(v) = lookup("MCP_SESSION_TIMEOUT_SECS") {
            self.session.inactivity_timeout_secs = parse_u64("MCP_SESSION_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("MCP_SESSION_SWEEP_SECS") {
            self.session.sweep_interval_secs = parse_u64("MCP_SESSION_SWEEP_SECS", v)?;
        }
        if let Some(v) = lookup("MCP_CHECK_SOURCE_ADDRESS") {
            self.session.check_source_address = parse_flag("MCP_CHECK_SOURCE_ADDRESS", v)?;
        }
        if let Some(v) = lookup("MCP_DEBUG_ENDPOINTS") {
            self.session.debug_endpoints = parse_flag("MCP_DEBUG_ENDPOINTS", v)?;
        }
        if let Some(origin) = lookup("MCP_ALLOWED_ORIGIN") {
            self.http.allowed_origin = origin;
        }
        if let Some(key) = lookup("TAILSCALE_API_KEY") {
            self.backend.api_key = key;
        }
        if let Some(tailnet) = lookup("TAILSCALE_TAILNET") {
            self.backend.tailnet = tailnet;
        }
        if let Some(url) = lookup("TAILSCALE_API_URL") {
            self.backend.api_base_url = url;
        }
        if let Some(path) = lookup("TAILSCALE_CLI_PATH") {
            self.backend.cli_path = path;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.inactivity_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.inactivity_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "session.sweep_interval_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "server.max_concurrent_requests must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_u64(name: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { name, value }),
    }
}
