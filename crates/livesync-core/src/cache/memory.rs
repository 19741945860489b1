//! In-process cache backend with per-entry expiry.
//!
//! Expiry uses `tokio::time::Instant`, so tests running on a paused clock can
//! advance past TTLs deterministically.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use tokio::time::Instant;

use super::Cache;
use crate::error::{SyncError, SyncResult};

enum Slot {
    Text(String),
    Hash(AHashMap<String, String>),
}

struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|t| t > now)
    }
}

/// In-memory [`Cache`].
///
/// Also counts mutating commands so callers can assert write amplification.
pub struct MemoryCache {
    entries: Mutex<AHashMap<String, Entry>>,
    ready: AtomicBool,
    writes: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(AHashMap::new()),
            ready: AtomicBool::new(true),
            writes: AtomicU64::new(0),
        }
    }

    /// Toggle the readiness check result.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Number of mutating commands (`set_raw`, `del`, `hash_set`) served so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Remaining TTL of a live key, `None` if missing or without expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.lock().ok()?;
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|t| t.saturating_duration_since(now))
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().map(|m| m.values().filter(|e| e.is_live(now)).count()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> SyncResult<std::sync::MutexGuard<'_, AHashMap<String, Entry>>> {
        self.entries.lock().map_err(|_| SyncError::Cache("memory cache lock poisoned".into()))
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_raw(&self, key: &str) -> SyncResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(e) => !e.is_live(now),
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        match entries.get(key).map(|e| &e.slot) {
            Some(Slot::Text(s)) => Ok(Some(s.clone())),
            Some(Slot::Hash(_)) => Err(SyncError::Cache(format!("WRONGTYPE: {key} holds a hash"))),
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> SyncResult<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.lock()?.insert(key.to_string(), Entry { slot: Slot::Text(value), expires_at });
        self.record_write();
        Ok(())
    }

    async fn del(&self, key: &str) -> SyncResult<()> {
        self.lock()?.remove(key);
        self.record_write();
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> SyncResult<()> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            slot: Slot::Hash(AHashMap::new()),
            expires_at: None,
        });
        if !entry.is_live(now) {
            *entry = Entry { slot: Slot::Hash(AHashMap::new()), expires_at: None };
        }
        match &mut entry.slot {
            Slot::Hash(h) => {
                h.insert(field.to_string(), value.to_string());
            }
            Slot::Text(_) => return Err(SyncError::Cache(format!("WRONGTYPE: {key} holds a string"))),
        }
        drop(entries);
        self.record_write();
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> SyncResult<Vec<(String, String)>> {
        let now = Instant::now();
        let entries = self.lock()?;
        match entries.get(key) {
            Some(e) if e.is_live(now) => match &e.slot {
                Slot::Hash(h) => Ok(h.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
                Slot::Text(_) => Err(SyncError::Cache(format!("WRONGTYPE: {key} holds a string"))),
            },
            _ => Ok(Vec::new()),
        }
    }
}
