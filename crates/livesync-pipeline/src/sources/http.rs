//! `reqwest` clients for the unified reader and the manual store.
//!
//! List endpoints are decoded record by record: one malformed record is
//! logged and skipped, its siblings still flow.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use livesync_core::config::SourcesConfig;
use livesync_core::error::{SyncError, SyncResult};
use livesync_core::{FixtureSnapshot, SportInfo};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{FixtureFeed, ManualMarket, ManualMatchRow, ManualStore, UnifiedFixture};

/// Header carrying the optional API key.
pub const API_KEY_HEADER: &str = "x-api-key";

// ---------------------------------------------------------------------------
// Shared JSON GET client
// ---------------------------------------------------------------------------

struct JsonClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl JsonClient {
    fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("livesync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), api_key })
    }

    /// `base_url` joined with `segments`, each percent-encoded as one path segment.
    fn url(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SyncError::Source(format!("bad base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| SyncError::Source(format!("base url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> SyncResult<T> {
        let url = self.url(segments)?;
        let mut req = self.http.get(url.clone()).query(query);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req.send().await.map_err(|e| SyncError::Source(format!("GET {url} failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Source(format!("GET {url} returned {status}: {body}")));
        }
        resp.json::<T>().await.map_err(|e| SyncError::Source(format!("GET {url}: undecodable body: {e}")))
    }

    /// GET a JSON array and decode each element on its own.
    async fn get_list<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> SyncResult<Vec<T>> {
        let raw: Vec<Value> = self.get(segments, query).await?;
        Ok(decode_records(&segments.join("/"), raw))
    }
}

/// Decode every record that fits `T`; the rest are logged and dropped.
fn decode_records<T: DeserializeOwned>(label: &str, raw: Vec<Value>) -> Vec<T> {
    let total = raw.len();
    let mut out = Vec::with_capacity(total);
    for (i, record) in raw.into_iter().enumerate() {
        match serde_json::from_value::<T>(record) {
            Ok(v) => out.push(v),
            Err(e) => warn!("[source] {label}: skipping record #{i}: {e}"),
        }
    }
    if out.len() < total {
        warn!("[source] {label}: {} of {total} record(s) undecodable", total - out.len());
    }
    out
}

// ---------------------------------------------------------------------------
// Unified reader
// ---------------------------------------------------------------------------

/// HTTP client for the unified reader.
pub struct HttpFixtureFeed {
    client: JsonClient,
}

impl HttpFixtureFeed {
    pub fn new(base_url: &str, cfg: &SourcesConfig) -> Result<Self> {
        Ok(Self { client: JsonClient::new(base_url, cfg.api_key.clone(), cfg.effective_timeout())? })
    }

    async fn fixtures(&self, slice: &str, query: &[(&str, String)]) -> Result<Vec<FixtureSnapshot>> {
        let raw: Vec<UnifiedFixture> = self.client.get_list(&["fixtures", slice], query).await?;
        Ok(into_snapshots(slice, raw))
    }
}

#[async_trait]
impl FixtureFeed for HttpFixtureFeed {
    async fn live_fixtures(&self) -> Result<Vec<FixtureSnapshot>> {
        self.fixtures("live", &[]).await
    }

    async fn upcoming_fixtures(&self, limit: usize) -> Result<Vec<FixtureSnapshot>> {
        self.fixtures("upcoming", &[("limit", limit.to_string())]).await
    }

    async fn sports(&self) -> Result<Vec<SportInfo>> {
        Ok(self.client.get_list(&["sports"], &[]).await?)
    }
}

fn into_snapshots(slice: &str, raw: Vec<UnifiedFixture>) -> Vec<FixtureSnapshot> {
    let total = raw.len();
    let snaps: Vec<FixtureSnapshot> = raw.into_iter().filter_map(UnifiedFixture::into_snapshot).collect();
    if snaps.len() < total {
        warn!("[feed] {slice}: dropped {} record(s) without an id", total - snaps.len());
    }
    debug!("[feed] {slice}: {} fixtures", snaps.len());
    snaps
}

// ---------------------------------------------------------------------------
// Manual store
// ---------------------------------------------------------------------------

/// HTTP client for the manual-match store.
pub struct HttpManualStore {
    client: JsonClient,
}

impl HttpManualStore {
    pub fn new(base_url: &str, cfg: &SourcesConfig) -> Result<Self> {
        Ok(Self { client: JsonClient::new(base_url, cfg.api_key.clone(), cfg.effective_timeout())? })
    }
}

#[async_trait]
impl ManualStore for HttpManualStore {
    async fn live_matches(&self) -> Result<Vec<ManualMatchRow>> {
        Ok(self.client.get_list(&["manual", "live"], &[]).await?)
    }

    async fn upcoming_matches(&self) -> Result<Vec<ManualMatchRow>> {
        Ok(self.client.get_list(&["manual", "upcoming"], &[]).await?)
    }

    async fn markets(&self, match_id: &str) -> Result<Vec<ManualMarket>> {
        Ok(self.client.get_list(&["manual", match_id, "markets"], &[]).await?)
    }
}
