//! Redis cache backend.
//!
//! Uses the `redis` crate's tokio [`ConnectionManager`], a multiplexed
//! connection that reconnects on its own. The manager is created lazily on
//! first use so a cold Redis at process start does not prevent startup; until
//! it comes up every command fails with [`SyncError::Cache`] and
//! [`Cache::is_ready`] reports `false`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::Cache;
use crate::error::SyncResult;

/// Redis-backed [`Cache`].
pub struct RedisCache {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisCache {
    /// Parse the URL. No connection is opened until the first command.
    pub fn new(url: &str) -> SyncResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self { client, conn: OnceCell::new() })
    }

    async fn conn(&self) -> SyncResult<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let mgr = ConnectionManager::new(self.client.clone()).await?;
                info!("[cache] redis connection established");
                Ok::<_, redis::RedisError>(mgr)
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> SyncResult<Option<String>> {
        let mut conn = self.conn().await?;
        let v: Option<String> = conn.get(key).await?;
        Ok(v)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> SyncResult<()> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> SyncResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(e) => {
                debug!("[cache] not ready: {e}");
                return false;
            }
        };
        redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok()
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> SyncResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> SyncResult<Vec<(String, String)>> {
        let mut conn = self.conn().await?;
        let map: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(map.into_iter().collect())
    }
}
