//! Tool registry: declares tools, validates arguments and dispatches calls.
//!
//! The registry is built once at startup (`register` takes `&mut self`),
//! then frozen behind an `Arc` and shared by whichever transport is running.
//! [`ToolRegistry::dispatch`] never fails: unknown tools, invalid arguments,
//! handler errors and handler panics all come back as a [`ToolResult`] with
//! `is_error` set and a plain-text message.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{Backend, BackendError};
use crate::result::ToolResult;
use crate::schema::Schema;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct ToolContext {
    pub backend: Arc<dyn Backend>,
}

impl ToolContext {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

/// Failure raised by a tool handler. Rendered to the caller as text only.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Failed(String),
}

type HandlerFuture = BoxFuture<'static, Result<ToolResult, ToolError>>;
type Handler = Arc<dyn Fn(Value, ToolContext) -> HandlerFuture + Send + Sync>;

/// A named tool: metadata, argument schema and handler.
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    schema: Schema,
    handler: Handler,
}

impl ToolDefinition {
    /// Define a tool whose handler takes typed arguments.
    ///
    /// Arguments are first checked against `schema` (which also fills
    /// defaults) and then deserialized into `A`.
    pub fn new<A, F, Fut>(name: &str, description: &str, schema: Schema, run: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult, ToolError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |args: Value, ctx: ToolContext| -> HandlerFuture {
            match serde_json::from_value::<A>(args) {
                Ok(typed) => run(typed, ctx).boxed(),
                Err(e) => {
                    let err = ToolError::InvalidArguments(e.to_string());
                    async move { Err::<ToolResult, _>(err) }.boxed()
                }
            }
        });
        Self {
            name: name.to_string(),
            description: description.to_string(),
            schema,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Tool metadata as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The set of tools plus the context handlers run with.
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDefinition>,
    context: ToolContext,
    overwritten: Vec<String>,
}

impl ToolRegistry {
    pub fn new(context: ToolContext) -> Self {
        Self {
            tools: IndexMap::new(),
            context,
            overwritten: Vec::new(),
        }
    }

    /// Add a tool. A tool with the same name is replaced (last write wins)
    /// and the replacement is logged and recorded in [`Self::overwritten`].
    pub fn register(&mut self, definition: ToolDefinition) {
        let name = definition.name.clone();
        if self.tools.insert(name.clone(), definition).is_some() {
            warn!("Tool '{name}' registered twice; keeping the latest definition");
            self.overwritten.push(name);
        } else {
            debug!("Registered tool '{name}'");
        }
    }

    /// Names that were registered more than once, in the order the
    /// duplicates occurred.
    pub fn overwritten(&self) -> &[String] {
        &self.overwritten
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// All tools in registration order.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|def| ToolInfo {
                name: def.name.clone(),
                description: def.description.clone(),
                input_schema: def.schema.to_json_schema(),
            })
            .collect()
    }

    /// Validate `raw_args` for tool `name` and run its handler.
    pub async fn dispatch(&self, name: &str, raw_args: &Value) -> ToolResult {
        let Some(definition) = self.tools.get(name) else {
            debug!("Call to unknown tool '{name}'");
            return ToolResult::error(format!("Unknown tool: {name}"));
        };

        let args = match definition.schema.validate(raw_args) {
            Ok(args) => args,
            Err(e) => {
                debug!("Tool '{name}' rejected arguments: {e}");
                return ToolResult::error(format!("Invalid arguments for tool '{name}': {e}"));
            }
        };

        let handler = Arc::clone(&definition.handler);
        let ctx = self.context.clone();
        let started = std::panic::catch_unwind(AssertUnwindSafe(move || handler(args, ctx)));
        let outcome = match started {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(panic) => Err(panic),
        };

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Tool '{name}' failed: {e}");
                ToolResult::error(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Tool '{name}' panicked: {message}");
                ToolResult::error(format!("Tool '{name}' failed unexpectedly: {message}"))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "internal error".to_string()
    }
}
