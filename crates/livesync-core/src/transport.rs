//! Pub/sub transport for batched diffs.
//!
//! One channel per sport (`sports:<sport_key>`), one event name (`update`).
//! The transport enforces a hard payload ceiling upstream; the publisher keeps
//! every payload under a safety margin below it, so implementations here send
//! whatever they are given.
//!
//! Wire format on Redis:
//!
//! ```text
//! PUBLISH sports:<sport_key> {"event":"update","data":<payload>}
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

/// Event name carried by every batch message.
pub const UPDATE_EVENT: &str = "update";

/// Outbound pub/sub transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish one serialized payload on a channel.
    async fn publish(&self, channel: &str, event: &str, payload: &str) -> SyncResult<()>;
}

// ---------------------------------------------------------------------------
// RedisTransport
// ---------------------------------------------------------------------------

/// Redis `PUBLISH` transport over a dedicated, lazily created connection.
pub struct RedisTransport {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisTransport {
    pub fn new(url: &str) -> SyncResult<Self> {
        let client = redis::Client::open(url).map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(Self { client, conn: OnceCell::new() })
    }

    async fn conn(&self) -> SyncResult<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let mgr = ConnectionManager::new(self.client.clone()).await?;
                info!("[transport] redis connection established");
                Ok::<_, redis::RedisError>(mgr)
            })
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok(conn.clone())
    }
}

/// Wrap a payload in the `{event, data}` envelope without re-parsing it.
pub fn envelope(event: &str, payload: &str) -> SyncResult<String> {
    Ok(format!(r#"{{"event":{},"data":{}}}"#, serde_json::to_string(event)?, payload))
}

#[async_trait]
impl Transport for RedisTransport {
    async fn publish(&self, channel: &str, event: &str, payload: &str) -> SyncResult<()> {
        let mut conn = self.conn().await?;
        let msg = envelope(event, payload)?;
        let receivers: i64 = conn.publish(channel, msg).await.map_err(|e| SyncError::Transport(e.to_string()))?;
        debug!("[transport] {channel}: {} bytes to {receivers} subscriber(s)", payload.len());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// A message captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub channel: String,
    pub event: String,
    pub payload: String,
}

/// Records published messages in memory. Used by tests and `--memory` runs.
#[derive(Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<PublishedMessage>>,
    failing: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of everything published so far.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().map(|v| v.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, channel: &str, event: &str, payload: &str) -> SyncResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Transport(format!("publish to {channel} rejected")));
        }
        let msg = PublishedMessage {
            channel: channel.to_string(),
            event: event.to_string(),
            payload: payload.to_string(),
        };
        self.sent
            .lock()
            .map_err(|_| SyncError::Transport("memory transport lock poisoned".into()))?
            .push(msg);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_embeds_payload_verbatim() {
        let e = envelope(UPDATE_EVENT, r#"{"type":"batch:updates","count":0}"#).unwrap();
        let v: serde_json::Value = serde_json::from_str(&e).unwrap();
        assert_eq!(v["event"], "update");
        assert_eq!(v["data"]["type"], "batch:updates");
    }

    #[tokio::test]
    async fn memory_transport_records_and_fails() {
        let t = MemoryTransport::new();
        t.publish("sports:soccer", UPDATE_EVENT, "{}").await.unwrap();
        assert_eq!(t.count(), 1);
        assert_eq!(t.messages()[0].channel, "sports:soccer");

        t.set_failing(true);
        assert!(matches!(t.publish("sports:soccer", UPDATE_EVENT, "{}").await, Err(SyncError::Transport(_))));
        assert_eq!(t.count(), 1);
    }
}
