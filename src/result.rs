//! The uniform output of every tool call.
//!
//! Serializes to the MCP `CallToolResult` shape:
//! `{"content": [{"type": "text", "text": "..."}], "isError": true}`.
//! `isError` is omitted on success.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single content block. Only `text` is produced today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

/// Result of an MCP tool call, ready to be serialized into a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Content blocks (typically a single text entry).
    pub content: Vec<Content>,
    /// Whether the tool call failed (maps to `isError` in the MCP response).
    #[serde(
        rename = "isError",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_error: bool,
}

impl ToolResult {
    /// Successful result carrying plain text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }

    /// Successful result carrying a JSON value rendered as pretty text.
    pub fn json(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text)
    }

    /// Failed result; `message` describes the failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(message)],
            is_error: true,
        }
    }

    /// All text blocks joined with newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "content": [{ "type": "text", "text": self.joined_text() }],
                "isError": self.is_error,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_omits_is_error() {
        let value = ToolResult::text("hi").to_value();
        assert_eq!(value, json!({ "content": [{ "type": "text", "text": "hi" }] }));
    }

    #[test]
    fn error_sets_is_error() {
        let value = ToolResult::error("boom").to_value();
        assert_eq!(value["isError"], json!(true));
        assert_eq!(value["content"][0]["text"], json!("boom"));
    }

    #[test]
    fn json_result_is_pretty_printed() {
        let result = ToolResult::json(&json!({ "a": 1 }));
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn deserializes_without_is_error() {
        let result: ToolResult =
            serde_json::from_value(json!({ "content": [{ "type": "text", "text": "ok" }] }))
                .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "ok");
    }
}
