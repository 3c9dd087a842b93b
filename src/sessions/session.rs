//! A single HTTP session record.

use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::auth::{constant_time_eq, TokenDigest};

/// Capacity of each session's server-push channel.
const PUSH_CHANNEL_CAPACITY: usize = 64;

/// What the caller looked like when the session was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub source_address: Option<IpAddr>,
}

pub struct Session {
    pub id: String,
    token_digest: TokenDigest,
    pub client_info: ClientInfo,
    /// Epoch milliseconds when the session was created.
    pub created_at: u64,
    pub last_accessed: Instant,
    /// Server-initiated messages for this session's event stream. Dropping
    /// the session drops the sender, which ends every open stream.
    push_tx: broadcast::Sender<Value>,
}

impl Session {
    pub fn new(id: String, token_digest: TokenDigest, client_info: ClientInfo) -> Self {
        let (push_tx, _) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
        Self {
            id,
            token_digest,
            client_info,
            created_at: now_ms(),
            last_accessed: Instant::now(),
            push_tx,
        }
    }

    pub fn token_matches(&self, digest: &TokenDigest) -> bool {
        constant_time_eq(&self.token_digest, digest)
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed)
    }

    pub fn is_expired(&self, now: Instant, threshold: Duration) -> bool {
        self.idle_for(now) > threshold
    }

    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.push_tx.subscribe()
    }

    /// Queue a message for open event streams. Returns how many streams
    /// will see it.
    pub fn push(&self, message: Value) -> usize {
        self.push_tx.send(message).unwrap_or(0)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
