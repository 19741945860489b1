//! Async key-value cache abstraction.
//!
//! The pipeline talks to the shared cache only through [`Cache`], which keeps
//! the byte-level operations small: string get/set/del with TTL, a readiness
//! check, and hash field operations for the append-only league catalog. Typed
//! access lives one layer up in [`crate::store::SnapshotStore`].
//!
//! Two backends are provided:
//!
//! 1. [`RedisCache`] — production backend over a reconnecting Redis connection.
//! 2. [`MemoryCache`] — in-process map with per-entry expiry, for tests and
//!    dry runs.

pub mod memory;
pub mod redis_cache;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SyncResult;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

/// Byte-level cache operations.
///
/// All implementations must tolerate concurrent calls from independent tasks;
/// the consistency model is per-key last-write-wins.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a string value. Missing or expired keys yield `Ok(None)`.
    async fn get_raw(&self, key: &str) -> SyncResult<Option<String>>;

    /// Store a string value. `ttl = None` stores without expiry.
    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> SyncResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn del(&self, key: &str) -> SyncResult<()>;

    /// `true` once the backend accepts commands.
    async fn is_ready(&self) -> bool;

    /// Set one field of a hash, creating the hash if needed. No expiry.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> SyncResult<()>;

    /// All `(field, value)` pairs of a hash; empty if the hash does not exist.
    async fn hash_get_all(&self, key: &str) -> SyncResult<Vec<(String, String)>>;
}
