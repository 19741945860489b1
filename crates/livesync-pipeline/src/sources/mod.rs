//! Upstream collaborators.
//!
//! Two seams, each an async trait so tests and alternative backends plug in
//! without touching the pipeline:
//!
//! - [`FixtureFeed`] — the unified reader (feed + manual, already merged)
//! - [`ManualStore`] — the manual-match store, read row by row
//!
//! [`http`] provides the production `reqwest` implementations.

pub mod http;
pub mod manual;
pub mod unified;

use anyhow::Result;
use async_trait::async_trait;
use livesync_core::{FixtureSnapshot, SportInfo};

pub use http::{HttpFixtureFeed, HttpManualStore};
pub use manual::{ManualAdapter, ManualMarket, ManualMatchRow};
pub use unified::UnifiedFixture;

/// The unified fixture reader.
#[async_trait]
pub trait FixtureFeed: Send + Sync {
    /// Every fixture currently in play.
    async fn live_fixtures(&self) -> Result<Vec<FixtureSnapshot>>;

    /// Up to `limit` not-yet-started fixtures.
    async fn upcoming_fixtures(&self, limit: usize) -> Result<Vec<FixtureSnapshot>>;

    /// The upstream sports list.
    async fn sports(&self) -> Result<Vec<SportInfo>>;
}

/// The manual-match store.
#[async_trait]
pub trait ManualStore: Send + Sync {
    async fn live_matches(&self) -> Result<Vec<ManualMatchRow>>;

    async fn upcoming_matches(&self) -> Result<Vec<ManualMatchRow>>;

    /// Markets for one match, keyed by the raw row id.
    async fn markets(&self, match_id: &str) -> Result<Vec<ManualMarket>>;
}
