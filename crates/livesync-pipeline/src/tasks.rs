//! The four sync tasks.
//!
//! | task | source | after processing |
//! |---|---|---|
//! | `live` | unified reader, live fixtures | live views + catalog |
//! | `prematch` | unified reader, upcoming fixtures | prematch views + catalog |
//! | `manual` | manual store rows + markets | catalog |
//! | `catalog` | unified reader sports list | `sports:list` |
//!
//! A fetch failure fails the cycle (nothing is processed). Projection and
//! catalog failures are logged; the cycle still counts as done because every
//! fixture has already been diffed and published.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use livesync_core::FixtureSnapshot;
use livesync_core::store::SnapshotStore;
use tracing::{info, warn};

use crate::pipeline::{CycleSummary, SyncPipeline};
use crate::projector::{LegacyProjector, View};
use crate::scheduler::SyncTask;
use crate::sources::{FixtureFeed, ManualAdapter};

/// What a feed task fetches and which view it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSlice {
    Live,
    Upcoming { limit: usize },
}

/// Live or upcoming fixtures from the unified reader.
pub struct FeedTask {
    name: &'static str,
    slice: FeedSlice,
    period: Duration,
    feed: Arc<dyn FixtureFeed>,
    pipeline: Arc<SyncPipeline>,
    projector: Arc<LegacyProjector>,
}

impl FeedTask {
    pub fn live(
        feed: Arc<dyn FixtureFeed>,
        pipeline: Arc<SyncPipeline>,
        projector: Arc<LegacyProjector>,
        period: Duration,
    ) -> Self {
        Self { name: "live", slice: FeedSlice::Live, period, feed, pipeline, projector }
    }

    pub fn prematch(
        feed: Arc<dyn FixtureFeed>,
        pipeline: Arc<SyncPipeline>,
        projector: Arc<LegacyProjector>,
        period: Duration,
        limit: usize,
    ) -> Self {
        Self { name: "prematch", slice: FeedSlice::Upcoming { limit }, period, feed, pipeline, projector }
    }

    async fn fetch(&self) -> Result<Vec<FixtureSnapshot>> {
        match self.slice {
            FeedSlice::Live => self.feed.live_fixtures().await.context("fetch live fixtures"),
            FeedSlice::Upcoming { limit } => {
                self.feed.upcoming_fixtures(limit).await.context("fetch upcoming fixtures")
            }
        }
    }
}

#[async_trait]
impl SyncTask for FeedTask {
    fn name(&self) -> &str {
        self.name
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run_cycle(&self) -> Result<CycleSummary> {
        let fixtures = self.fetch().await?;
        let summary = self.pipeline.process(self.name, &fixtures).await;

        let view = match self.slice {
            FeedSlice::Live => View::Live,
            FeedSlice::Upcoming { .. } => View::Prematch,
        };
        if let Err(e) = self.projector.project(view, &fixtures).await {
            warn!("[{}] legacy projection failed: {e}", self.name);
        }
        if let Err(e) = self.projector.record_catalog(&fixtures).await {
            warn!("[{}] catalog update failed: {e}", self.name);
        }
        Ok(summary)
    }
}

/// Manually managed matches.
pub struct ManualTask {
    period: Duration,
    adapter: ManualAdapter,
    pipeline: Arc<SyncPipeline>,
    projector: Arc<LegacyProjector>,
}

impl ManualTask {
    pub fn new(
        adapter: ManualAdapter,
        pipeline: Arc<SyncPipeline>,
        projector: Arc<LegacyProjector>,
        period: Duration,
    ) -> Self {
        Self { period, adapter, pipeline, projector }
    }
}

#[async_trait]
impl SyncTask for ManualTask {
    fn name(&self) -> &str {
        "manual"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run_cycle(&self) -> Result<CycleSummary> {
        let fixtures = self.adapter.fetch_all().await.context("fetch manual matches")?;
        let summary = self.pipeline.process("manual", &fixtures).await;
        if let Err(e) = self.projector.record_catalog(&fixtures).await {
            warn!("[manual] catalog update failed: {e}");
        }
        Ok(summary)
    }
}

/// Refreshes `sports:list` ahead of its TTL.
pub struct CatalogTask {
    period: Duration,
    feed: Arc<dyn FixtureFeed>,
    store: SnapshotStore,
}

impl CatalogTask {
    pub fn new(feed: Arc<dyn FixtureFeed>, store: SnapshotStore, period: Duration) -> Self {
        Self { period, feed, store }
    }
}

#[async_trait]
impl SyncTask for CatalogTask {
    fn name(&self) -> &str {
        "catalog"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run_cycle(&self) -> Result<CycleSummary> {
        let sports = self.feed.sports().await.context("fetch sports list")?;
        self.store.set_sports(&sports).await.context("write sports list")?;
        let active = sports.iter().filter(|s| s.active).count();
        info!("[catalog] sports list refreshed: {} sport(s), {active} active", sports.len());
        Ok(CycleSummary { fetched: sports.len(), ..Default::default() })
    }
}
