//! Configuration parsing for the sync service.
//!
//! All components read their settings from a single JSON config file. Every
//! tunable is optional; the `effective_*` accessors supply the production
//! defaults so a minimal config only names the backends.
//!
//! # Example config
//!
//! ```json
//! {
//!   "service": { "name": "livesync", "log_path": "/var/log/livesync" },
//!   "cache": { "url": "redis://127.0.0.1:6379/0" },
//!   "transport": { "url": "redis://127.0.0.1:6379/0" },
//!   "sources": {
//!     "feed_url": "http://matches.internal:8080",
//!     "manual_url": "http://admin.internal:8080",
//!     "upcoming_limit": 200
//!   },
//!   "schedule": { "live_interval_sec": 33, "concurrency": 6 },
//!   "publisher": { "max_batch": 50, "flush_window_ms": 300 },
//!   "store": { "fixture_ttl_sec": 3600, "refresh_ttl_on_unchanged": false }
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::SyncError;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Service metadata (name, log path).
    pub service: Option<ServiceMeta>,

    /// Shared snapshot cache backend.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Pub/sub transport backend.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Upstream source endpoints.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Polling cadence and fan-out limits.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Batch publisher tuning.
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Persisted key TTLs.
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Returns the service name from the metadata block, defaulting to `livesync`.
    pub fn service_name(&self) -> String {
        self.service.as_ref().and_then(|m| m.name.clone()).unwrap_or_else(|| "livesync".to_string())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.service.as_ref().and_then(|m| m.log_path.clone())
    }

    /// Reject configurations that cannot possibly run.
    ///
    /// With `in_memory` set, the cache and transport URLs are not required.
    pub fn validate(&self, in_memory: bool) -> Result<(), SyncError> {
        if !in_memory {
            if self.cache.url.as_deref().is_none_or(str::is_empty) {
                return Err(SyncError::Config("cache.url is required".into()));
            }
            if self.transport.url.as_deref().is_none_or(str::is_empty) {
                return Err(SyncError::Config("transport.url is required".into()));
            }
        }
        if self.sources.feed_url.is_none() && self.sources.manual_url.is_none() {
            return Err(SyncError::Config("at least one of sources.feed_url / sources.manual_url is required".into()));
        }
        let max = self.publisher.effective_max_message_bytes();
        let hard = self.transport.effective_hard_limit_bytes();
        if max > hard {
            return Err(SyncError::Config(format!(
                "publisher.max_message_bytes ({max}) exceeds transport.hard_limit_bytes ({hard})"
            )));
        }
        if self.schedule.effective_concurrency() == 0 {
            return Err(SyncError::Config("schedule.concurrency must be > 0".into()));
        }
        Ok(())
    }
}

/// Service metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceMeta {
    pub name: Option<String>,
    pub log_path: Option<String>,
}

/// Shared cache configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    /// Redis URL (e.g. `redis://127.0.0.1:6379/0`).
    pub url: Option<String>,

    /// Readiness checks before degraded startup (default: 30).
    pub ready_attempts: Option<u32>,

    /// Delay between readiness checks in milliseconds (default: 2000).
    pub ready_interval_ms: Option<u64>,
}

impl CacheConfig {
    pub fn effective_ready_attempts(&self) -> u32 {
        self.ready_attempts.unwrap_or(30)
    }

    pub fn effective_ready_interval(&self) -> Duration {
        Duration::from_millis(self.ready_interval_ms.unwrap_or(2_000))
    }
}

/// Pub/sub transport configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportConfig {
    /// Redis URL used for `PUBLISH`.
    pub url: Option<String>,

    /// Hard payload ceiling of the transport (default: 65_536).
    pub hard_limit_bytes: Option<usize>,
}

impl TransportConfig {
    pub fn effective_hard_limit_bytes(&self) -> usize {
        self.hard_limit_bytes.unwrap_or(65_536)
    }
}

/// Upstream source configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    /// Base URL of the unified match reader (feed + manual merged).
    pub feed_url: Option<String>,

    /// Base URL of the manual match store.
    pub manual_url: Option<String>,

    /// Optional API key sent as `x-api-key`.
    pub api_key: Option<String>,

    /// HTTP request timeout in milliseconds (default: 10_000).
    pub timeout_ms: Option<u64>,

    /// Maximum upcoming fixtures fetched per prematch cycle (default: 200).
    pub upcoming_limit: Option<usize>,
}

impl SourcesConfig {
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(10_000))
    }

    pub fn effective_upcoming_limit(&self) -> usize {
        self.upcoming_limit.unwrap_or(200)
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    /// Live poll period (default: 33 s, the upstream feed's refresh cadence).
    pub live_interval_sec: Option<u64>,

    /// Prematch poll period (default: 60 s).
    pub prematch_interval_sec: Option<u64>,

    /// Manual poll period (default: 10 s).
    pub manual_interval_sec: Option<u64>,

    /// Catalog / sports-list refresh period (default: 1800 s).
    pub catalog_interval_sec: Option<u64>,

    /// Maximum fixtures processed concurrently per cycle (default: 6).
    pub concurrency: Option<usize>,

    /// Per-cycle time budget in seconds; a cycle past it is logged, not cancelled.
    /// Defaults to the task's own period.
    pub cycle_timeout_sec: Option<u64>,
}

impl ScheduleConfig {
    pub fn effective_live_interval(&self) -> Duration {
        Duration::from_secs(self.live_interval_sec.unwrap_or(33))
    }

    pub fn effective_prematch_interval(&self) -> Duration {
        Duration::from_secs(self.prematch_interval_sec.unwrap_or(60))
    }

    pub fn effective_manual_interval(&self) -> Duration {
        Duration::from_secs(self.manual_interval_sec.unwrap_or(10))
    }

    pub fn effective_catalog_interval(&self) -> Duration {
        Duration::from_secs(self.catalog_interval_sec.unwrap_or(1_800))
    }

    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(6)
    }

    /// Timeout for one cycle of a task with the given period.
    pub fn effective_cycle_timeout(&self, period: Duration) -> Duration {
        self.cycle_timeout_sec.map(Duration::from_secs).unwrap_or(period)
    }
}

/// Batch publisher configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublisherConfig {
    /// Queue length that triggers an immediate flush (default: 50).
    pub max_batch: Option<usize>,

    /// Flush window after the first enqueue, in milliseconds (default: 300).
    pub flush_window_ms: Option<u64>,

    /// Per-message safety margin in bytes (default: 60_000).
    pub max_message_bytes: Option<usize>,

    /// Interval between stats log lines in seconds (default: 60, 0 disables).
    pub stats_interval_sec: Option<u64>,

    /// Deadline for the final flush on shutdown in milliseconds (default: 5000).
    pub shutdown_deadline_ms: Option<u64>,
}

impl PublisherConfig {
    pub fn effective_max_batch(&self) -> usize {
        self.max_batch.unwrap_or(50).max(1)
    }

    pub fn effective_flush_window(&self) -> Duration {
        Duration::from_millis(self.flush_window_ms.unwrap_or(300))
    }

    pub fn effective_max_message_bytes(&self) -> usize {
        self.max_message_bytes.unwrap_or(60_000)
    }

    pub fn effective_stats_interval(&self) -> Option<Duration> {
        match self.stats_interval_sec.unwrap_or(60) {
            0 => None,
            n => Some(Duration::from_secs(n)),
        }
    }

    pub fn effective_shutdown_deadline(&self) -> Duration {
        Duration::from_millis(self.shutdown_deadline_ms.unwrap_or(5_000))
    }
}

/// TTLs for persisted keys, in seconds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub fixture_ttl_sec: Option<u64>,
    pub league_index_ttl_sec: Option<u64>,
    pub live_view_ttl_sec: Option<u64>,
    pub prematch_view_ttl_sec: Option<u64>,
    pub live_markets_ttl_sec: Option<u64>,
    pub upcoming_markets_ttl_sec: Option<u64>,
    pub sports_ttl_sec: Option<u64>,

    /// Re-write unchanged snapshots to refresh their TTL (default: false).
    pub refresh_ttl_on_unchanged: Option<bool>,
}

impl StoreConfig {
    pub fn effective_refresh_ttl_on_unchanged(&self) -> bool {
        self.refresh_ttl_on_unchanged.unwrap_or(false)
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
