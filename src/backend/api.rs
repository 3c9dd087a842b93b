//! HTTP client for the control-plane REST API.
//!
//! [`ApiBackend`] wraps `reqwest::Client` and provides typed methods for
//! each endpoint the tools use. Responses are returned as
//! `serde_json::Value`; the tool layer handles formatting.
//!
//! Non-2xx responses are parsed for a `message` field in the JSON body. If
//! parsing fails, the raw response body is returned as the error message.

use std::time::Duration;

use serde_json::{json, Value};

use super::BackendError;

/// Client for one tailnet's API.
pub struct ApiBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    tailnet: String,
}

impl ApiBackend {
    /// `timeout_ms` bounds each request end to end.
    pub fn new(
        base_url: &str,
        api_key: &str,
        tailnet: &str,
        timeout_ms: u64,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mcp-tailnet/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        // Strip trailing slash for consistent URL construction
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            tailnet: tailnet.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /tailnet/{tailnet}/devices`
    pub async fn list_devices(&self) -> Result<Value, BackendError> {
        let resp = self
            .http
            .get(format!(
                "{}/tailnet/{}/devices?fields=all",
                self.base_url, self.tailnet
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let body = Self::handle_response(resp).await?;
        // The API wraps the list as {"devices": [...]}
        Ok(body.get("devices").cloned().unwrap_or(body))
    }

    /// `GET /device/{id}`
    pub async fn get_device(&self, device_id: &str) -> Result<Value, BackendError> {
        let device_id = check_device_id(device_id)?;
        let resp = self
            .http
            .get(format!("{}/device/{}?fields=all", self.base_url, device_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// `POST /device/{id}/authorized`
    pub async fn authorize_device(
        &self,
        device_id: &str,
        authorized: bool,
    ) -> Result<Value, BackendError> {
        let device_id = check_device_id(device_id)?;
        let resp = self
            .http
            .post(format!("{}/device/{}/authorized", self.base_url, device_id))
            .bearer_auth(&self.api_key)
            .json(&json!({ "authorized": authorized }))
            .send()
            .await?;
        Self::handle_response(resp).await?;
        Ok(json!({ "device_id": device_id, "authorized": authorized }))
    }

    /// `DELETE /device/{id}`
    pub async fn delete_device(&self, device_id: &str) -> Result<Value, BackendError> {
        let device_id = check_device_id(device_id)?;
        let resp = self
            .http
            .delete(format!("{}/device/{}", self.base_url, device_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::handle_response(resp).await?;
        Ok(json!({ "device_id": device_id, "deleted": true }))
    }

    /// `POST /device/{id}/tags`
    pub async fn set_device_tags(
        &self,
        device_id: &str,
        tags: &[String],
    ) -> Result<Value, BackendError> {
        let device_id = check_device_id(device_id)?;
        if let Some(bad) = tags.iter().find(|t| !t.starts_with("tag:")) {
            return Err(BackendError::InvalidArgument(format!(
                "tag {bad:?} must start with \"tag:\""
            )));
        }
        let resp = self
            .http
            .post(format!("{}/device/{}/tags", self.base_url, device_id))
            .bearer_auth(&self.api_key)
            .json(&json!({ "tags": tags }))
            .send()
            .await?;
        Self::handle_response(resp).await?;
        Ok(json!({ "device_id": device_id, "tags": tags }))
    }

    /// Parse an HTTP response - returns the JSON body on success, or a
    /// [`BackendError::Api`] carrying the API's message on failure. Empty
    /// success bodies become `{}`.
    async fn handle_response(resp: reqwest::Response) -> Result<Value, BackendError> {
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(json!({}));
            }
            serde_json::from_str(&body)
                .map_err(|e| BackendError::Protocol(format!("invalid JSON from API: {e}")))
        } else {
            Err(BackendError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            })
        }
    }
}

/// Device IDs end up in URL paths, so only allow the characters real IDs use.
fn check_device_id(device_id: &str) -> Result<&str, BackendError> {
    let trimmed = device_id.trim();
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(BackendError::InvalidArgument(format!(
            "device id {device_id:?} is not valid"
        )));
    }
    Ok(trimmed)
}

/// Extract the API's error text from a failure body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ids_reject_path_tricks() {
        assert!(check_device_id("nTKvKa3CNTRL").is_ok());
        assert!(check_device_id("12345-abc_def").is_ok());
        assert!(check_device_id("../keys").is_err());
        assert!(check_device_id("a/b").is_err());
        assert!(check_device_id("  ").is_err());
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(error_message(r#"{"message":"not found"}"#), "not found");
        assert_eq!(error_message(r#"{"error":"denied"}"#), "denied");
        assert_eq!(error_message("upstream exploded\n"), "upstream exploded");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let api = ApiBackend::new("https://api.example.com/api/v2/", "k", "-", 1000).unwrap();
        assert_eq!(api.base_url(), "https://api.example.com/api/v2");
    }

    #[tokio::test]
    async fn tags_must_be_prefixed() {
        let api = ApiBackend::new("http://127.0.0.1:9", "k", "-", 1000).unwrap();
        let err = api
            .set_device_tags("abc", &["server".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidArgument(_)));
    }
}
