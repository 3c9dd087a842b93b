//! Network-management backend used by tool handlers.
//!
//! The registry treats the backend as opaque: handlers get an
//! `Arc<dyn Backend>` through [`ToolContext`](crate::registry::ToolContext)
//! and every operation answers with the same [`BackendResponse`] envelope.
//!
//! Two concrete clients sit behind [`UnifiedBackend`]:
//!
//! - [`api::ApiBackend`] - HTTP API (device inventory, authorization, tags)
//! - [`cli::CliBackend`] - local CLI subprocess (status, up/down, ping)
//!
//! Both enforce their own timeouts, so a hung API or CLI surfaces as an
//! error envelope instead of a stuck handler.

pub mod api;
pub mod cli;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::BackendConfig;
use api::ApiBackend;
use cli::CliBackend;

/// Uniform `{success, data?, error?}` answer from every backend operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackendResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Collapse the envelope into a `Result` for `?`-style handler code.
    pub fn into_result(self) -> Result<Value, BackendError> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(BackendError::Failed(
                self.error
                    .unwrap_or_else(|| "backend operation failed".to_string()),
            ))
        }
    }
}

impl From<Result<Value, BackendError>> for BackendResponse {
    fn from(result: Result<Value, BackendError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// Errors produced by the API and CLI clients.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport error (connection refused, timeout, DNS failure, etc.).
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The API returned a non-2xx status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    /// The response body was not what we expected.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The CLI binary could not be started.
    #[error("failed to run CLI: {0}")]
    Spawn(String),
    /// The CLI exited with a non-zero status.
    #[error("CLI exited with code {code}: {stderr}")]
    Cli { code: i32, stderr: String },
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    /// Rejected before reaching the API/CLI.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation needs a client that isn't configured.
    #[error("{0}")]
    Unavailable(String),
    /// Failure reported through a [`BackendResponse`] envelope.
    #[error("{0}")]
    Failed(String),
}

/// Options for bringing the local node onto the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub accept_routes: bool,
    #[serde(default)]
    pub accept_dns: Option<bool>,
    #[serde(default)]
    pub advertise_routes: Vec<String>,
    #[serde(default)]
    pub advertise_tags: Vec<String>,
    #[serde(default)]
    pub exit_node: Option<String>,
    #[serde(default)]
    pub auth_key: Option<String>,
}

/// Operations the tool layer can ask for. Implementations must be cheap to
/// share across concurrent handlers; any serialization they need is their
/// own business.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_devices(&self) -> BackendResponse;
    async fn get_device(&self, device_id: &str) -> BackendResponse;
    async fn authorize_device(&self, device_id: &str, authorized: bool) -> BackendResponse;
    async fn delete_device(&self, device_id: &str) -> BackendResponse;
    async fn set_device_tags(&self, device_id: &str, tags: &[String]) -> BackendResponse;
    async fn network_status(&self) -> BackendResponse;
    async fn connect(&self, options: &ConnectOptions) -> BackendResponse;
    async fn disconnect(&self) -> BackendResponse;
    async fn ping_peer(&self, target: &str, count: u32) -> BackendResponse;
    async fn version(&self) -> BackendResponse;
}

/// Routes device operations to the API client and local-node operations to
/// the CLI.
pub struct UnifiedBackend {
    api: Option<ApiBackend>,
    cli: CliBackend,
}

impl UnifiedBackend {
    pub fn new(api: Option<ApiBackend>, cli: CliBackend) -> Self {
        Self { api, cli }
    }

    /// Build both clients from configuration. The API client is skipped when
    /// no key is configured.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let api = if config.api_key.is_empty() {
            None
        } else {
            Some(ApiBackend::new(
                &config.api_base_url,
                &config.api_key,
                &config.tailnet,
                config.api_timeout_ms,
            )?)
        };
        let cli = CliBackend::new(&config.cli_path, config.cli_timeout_ms);
        Ok(Self::new(api, cli))
    }

    pub fn has_api(&self) -> bool {
        self.api.is_some()
    }

    fn api(&self) -> Result<&ApiBackend, BackendError> {
        self.api.as_ref().ok_or_else(|| {
            BackendError::Unavailable(
                "API access is not configured (set TAILSCALE_API_KEY)".to_string(),
            )
        })
    }
}

#[async_trait]
impl Backend for UnifiedBackend {
    async fn list_devices(&self) -> BackendResponse {
        match self.api() {
            Ok(api) => api.list_devices().await.into(),
            Err(e) => BackendResponse::err(e.to_string()),
        }
    }

    async fn get_device(&self, device_id: &str) -> BackendResponse {
        match self.api() {
            Ok(api) => api.get_device(device_id).await.into(),
            Err(e) => BackendResponse::err(e.to_string()),
        }
    }

    async fn authorize_device(&self, device_id: &str, authorized: bool) -> BackendResponse {
        match self.api() {
            Ok(api) => api.authorize_device(device_id, authorized).await.into(),
            Err(e) => BackendResponse::err(e.to_string()),
        }
    }

    async fn delete_device(&self, device_id: &str) -> BackendResponse {
        match self.api() {
            Ok(api) => api.delete_device(device_id).await.into(),
            Err(e) => BackendResponse::err(e.to_string()),
        }
    }

    async fn set_device_tags(&self, device_id: &str, tags: &[String]) -> BackendResponse {
        match self.api() {
            Ok(api) => api.set_device_tags(device_id, tags).await.into(),
            Err(e) => BackendResponse::err(e.to_string()),
        }
    }

    async fn network_status(&self) -> BackendResponse {
        self.cli.status().await.into()
    }

    async fn connect(&self, options: &ConnectOptions) -> BackendResponse {
        self.cli.up(options).await.into()
    }

    async fn disconnect(&self) -> BackendResponse {
        self.cli.down().await.into()
    }

    async fn ping_peer(&self, target: &str, count: u32) -> BackendResponse {
        self.cli.ping(target, count).await.into()
    }

    async fn version(&self) -> BackendResponse {
        self.cli.version().await.into()
    }
}
