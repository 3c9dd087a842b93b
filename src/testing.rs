//! In-memory backend for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::{Backend, BackendResponse, ConnectOptions};

/// Answers every operation with canned data and records what was called.
#[derive(Default)]
pub struct StubBackend {
    /// When set, every operation fails with this message.
    pub failure: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn answer(&self, call: String, data: Value) -> BackendResponse {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        match &self.failure {
            Some(message) => BackendResponse::err(message.clone()),
            None => BackendResponse::ok(data),
        }
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn list_devices(&self) -> BackendResponse {
        self.answer(
            "list_devices".into(),
            json!([
                { "id": "n1", "hostname": "nas", "addresses": ["100.64.0.1"], "authorized": true },
                { "id": "n2", "hostname": "laptop", "addresses": ["100.64.0.2"], "authorized": false }
            ]),
        )
    }

    async fn get_device(&self, device_id: &str) -> BackendResponse {
        self.answer(
            format!("get_device {device_id}"),
            json!({ "id": device_id, "hostname": "nas" }),
        )
    }

    async fn authorize_device(&self, device_id: &str, authorized: bool) -> BackendResponse {
        self.answer(
            format!("authorize_device {device_id} {authorized}"),
            json!({ "device_id": device_id, "authorized": authorized }),
        )
    }

    async fn delete_device(&self, device_id: &str) -> BackendResponse {
        self.answer(
            format!("delete_device {device_id}"),
            json!({ "device_id": device_id, "deleted": true }),
        )
    }

    async fn set_device_tags(&self, device_id: &str, tags: &[String]) -> BackendResponse {
        self.answer(
            format!("set_device_tags {device_id} {}", tags.join(",")),
            json!({ "device_id": device_id, "tags": tags }),
        )
    }

    async fn network_status(&self) -> BackendResponse {
        self.answer(
            "network_status".into(),
            json!({ "BackendState": "Running", "Self": { "HostName": "stub" } }),
        )
    }

    async fn connect(&self, options: &ConnectOptions) -> BackendResponse {
        self.answer(
            format!("connect {:?}", options.hostname),
            json!({ "connected": true }),
        )
    }

    async fn disconnect(&self) -> BackendResponse {
        self.answer("disconnect".into(), json!({ "connected": false }))
    }

    async fn ping_peer(&self, target: &str, count: u32) -> BackendResponse {
        self.answer(
            format!("ping_peer {target} {count}"),
            json!({ "target": target, "output": "pong" }),
        )
    }

    async fn version(&self) -> BackendResponse {
        self.answer("version".into(), json!({ "version": "1.0.0-stub" }))
    }
}
