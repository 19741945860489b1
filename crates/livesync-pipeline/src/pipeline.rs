//! Per-fixture processing: read → diff → persist → index → publish → markets.
//!
//! Every fixture of a cycle is processed as its own future; a shared
//! [`Semaphore`] bounds how many touch the cache at once. Within one fixture
//! the steps are strictly sequential, and a fixture with no diff stops right
//! after the read: nothing is written, indexed, published or generated.
//!
//! One fixture failing never affects the others; the failure is logged with
//! the fixture id and counted in the [`CycleSummary`].

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use livesync_core::store::{CachedMarkets, SnapshotStore};
use livesync_core::time_util;
use livesync_core::FixtureSnapshot;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::diff;
use crate::markets::MarketGenerator;
use crate::publisher::BatchPublisher;

/// Default per-cycle fan-out.
pub const DEFAULT_CONCURRENCY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    New,
    Updated,
    Unchanged,
}

/// Per-cycle counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub fetched: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl CycleSummary {
    /// Fixtures that produced a diff.
    pub fn diffs(&self) -> usize {
        self.new + self.updated
    }
}

impl std::fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched={} diffs={} (new={} updated={}) unchanged={} failed={}",
            self.fetched,
            self.diffs(),
            self.new,
            self.updated,
            self.unchanged,
            self.failed
        )
    }
}

/// The diff-and-publish engine shared by every sync task.
pub struct SyncPipeline {
    store: SnapshotStore,
    publisher: BatchPublisher,
    markets: Arc<dyn MarketGenerator>,
    limiter: Arc<Semaphore>,
    refresh_ttl_on_unchanged: bool,
}

impl SyncPipeline {
    pub fn new(
        store: SnapshotStore,
        publisher: BatchPublisher,
        markets: Arc<dyn MarketGenerator>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            publisher,
            markets,
            limiter: Arc::new(Semaphore::new(concurrency.max(1))),
            refresh_ttl_on_unchanged: false,
        }
    }

    /// Re-write unchanged snapshots so their TTL restarts. Never publishes.
    pub fn with_ttl_refresh(mut self, enabled: bool) -> Self {
        self.refresh_ttl_on_unchanged = enabled;
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn publisher(&self) -> &BatchPublisher {
        &self.publisher
    }

    /// Process one cycle's fixtures. `label` tags the log lines.
    pub async fn process(&self, label: &str, fixtures: &[FixtureSnapshot]) -> CycleSummary {
        let results = join_all(fixtures.iter().map(|f| self.process_one(f))).await;

        let mut summary = CycleSummary { fetched: fixtures.len(), ..Default::default() };
        for (fixture, result) in fixtures.iter().zip(results) {
            match result {
                Ok(Outcome::New) => summary.new += 1,
                Ok(Outcome::Updated) => summary.updated += 1,
                Ok(Outcome::Unchanged) => summary.unchanged += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!("[{label}] fixture {} failed: {e:#}", fixture.id);
                }
            }
        }
        summary
    }

    async fn process_one(&self, fixture: &FixtureSnapshot) -> Result<Outcome> {
        let _permit = self.limiter.acquire().await.context("fan-out limiter closed")?;

        let prev = self.store.get_fixture(&fixture.id).await.context("read snapshot")?;

        let Some(diff) = diff::diff(prev.as_ref(), fixture) else {
            if self.refresh_ttl_on_unchanged {
                if let Some(prev) = &prev {
                    // The stored value, not the fresh one: sub-tolerance odds drift must not accumulate.
                    self.store.put_fixture(prev).await.context("refresh snapshot ttl")?;
                }
            }
            return Ok(Outcome::Unchanged);
        };

        let outcome = if diff.is_new() { Outcome::New } else { Outcome::Updated };
        debug!("{}: {} change(s)", fixture.id, diff.changes.len());

        self.store.put_fixture(fixture).await.context("write snapshot")?;
        self.store.index_fixture(&fixture.league_id, &fixture.id).await.context("index fixture")?;
        self.publisher.enqueue(diff);

        let markets = self.markets.generate(fixture).context("generate markets")?;
        let cached = CachedMarkets { markets, generated_at: time_util::now_ms() };
        self.store.put_markets(&fixture.id, &cached, fixture.is_live()).await.context("cache markets")?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use livesync_core::cache::{Cache, MemoryCache};
    use livesync_core::error::SyncResult;
    use livesync_core::keys::{self, Ttls};
    use livesync_core::{FixtureStatus, Odds};
    use serde_json::{Value, json};

    use crate::markets::BookmakerMarkets;
    use crate::test_support::*;

    fn pipeline(h: &Harness) -> SyncPipeline {
        SyncPipeline::new(h.store.clone(), h.publisher.clone(), Arc::new(BookmakerMarkets), DEFAULT_CONCURRENCY)
    }

    #[tokio::test(start_paused = true)]
    async fn first_sighting_persists_indexes_publishes_and_caches_markets() {
        let h = harness();
        let p = pipeline(&h);

        let summary = p.process("test", &[fixture("m1")]).await;
        assert_eq!(summary, CycleSummary { fetched: 1, new: 1, ..Default::default() });

        assert_eq!(h.store.get_fixture("m1").await.unwrap(), Some(fixture("m1")));
        assert_eq!(h.store.league_fixture_ids("39").await.unwrap(), vec!["m1"]);
        assert_eq!(h.cache.ttl("match:markets:m1"), Some(keys::UPCOMING_MARKETS_TTL));
        let cached = h.store.get_markets("m1").await.unwrap().unwrap();
        assert_eq!(cached.markets[0]["key"], "h2h");

        h.publisher.flush().await;
        let updates = published_updates(&h.transport);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0]["fixture_id"], "m1");
        assert_eq!(updates[0]["changes"][0]["path"], "new");
        assert_eq!(h.transport.messages()[0].channel, "sports:soccer_epl");
    }

    #[tokio::test(start_paused = true)]
    async fn repeat_cycle_is_silent() {
        let h = harness();
        let p = pipeline(&h);
        let batch = vec![fixture("m1"), fixture("m2"), live(fixture("m3"))];

        p.process("test", &batch).await;
        h.publisher.flush().await;
        let writes = h.cache.writes();
        let messages = h.transport.count();

        let summary = p.process("test", &batch).await;
        h.publisher.flush().await;
        assert_eq!(summary.unchanged, 3);
        assert_eq!(summary.diffs(), 0);
        assert_eq!(h.cache.writes(), writes);
        assert_eq!(h.transport.count(), messages);
    }

    #[tokio::test(start_paused = true)]
    async fn kickoff_and_price_move_produce_one_diff() {
        let h = harness();
        let p = pipeline(&h);
        p.process("test", &[fixture("m1")]).await;

        let mut kicked_off = live(fixture("m1"));
        kicked_off.odds = Some(Odds { home: 1.95, draw: Some(3.00), away: 3.50 });
        let summary = p.process("test", &[kicked_off.clone()]).await;
        assert_eq!(summary.updated, 1);

        h.publisher.flush().await;
        let updates = published_updates(&h.transport);
        let last = updates.last().unwrap();
        let paths: Vec<&str> =
            last["changes"].as_array().unwrap().iter().map(|c| c["path"].as_str().unwrap()).collect();
        assert_eq!(paths, ["status", "odds"]);
        assert_eq!(last["changes"][1]["value"], json!({"home": 1.95, "draw": 3.0, "away": 3.5}));

        assert_eq!(h.store.get_fixture("m1").await.unwrap().unwrap().status, FixtureStatus::Live);
        assert_eq!(h.cache.ttl("match:markets:m1"), Some(keys::LIVE_MARKETS_TTL));
    }

    #[tokio::test(start_paused = true)]
    async fn sub_tolerance_jitter_writes_nothing() {
        let h = harness();
        let p = pipeline(&h);
        p.process("test", &[fixture("m1")]).await;
        let writes = h.cache.writes();

        let mut jitter = fixture("m1");
        jitter.odds = Some(Odds { home: 2.005, draw: Some(3.00), away: 3.50 });
        let summary = p.process("test", &[jitter]).await;
        assert_eq!(summary.unchanged, 1);
        assert_eq!(h.cache.writes(), writes);
        assert_eq!(h.store.get_fixture("m1").await.unwrap().unwrap().odds.unwrap().home, 2.00);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_refresh_rewrites_stored_snapshot_only() {
        let h = harness();
        let p = pipeline(&h).with_ttl_refresh(true);
        p.process("test", &[fixture("m1")]).await;
        h.publisher.flush().await;
        let writes = h.cache.writes();
        let messages = h.transport.count();

        tokio::time::advance(Duration::from_secs(600)).await;
        let mut jitter = fixture("m1");
        jitter.odds = Some(Odds { home: 2.004, draw: Some(3.00), away: 3.50 });
        p.process("test", &[jitter]).await;
        h.publisher.flush().await;

        assert_eq!(h.cache.writes(), writes + 1);
        assert_eq!(h.transport.count(), messages);
        assert_eq!(h.cache.ttl("fixture:m1"), Some(keys::FIXTURE_TTL));
        assert_eq!(h.store.get_fixture("m1").await.unwrap(), Some(fixture("m1")));
    }

    struct BrokenMarkets;

    impl MarketGenerator for BrokenMarkets {
        fn generate(&self, fixture: &FixtureSnapshot) -> anyhow::Result<Vec<Value>> {
            if fixture.id == "bad" { Err(anyhow!("pricing model unavailable")) } else { Ok(vec![]) }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_stop_the_cycle() {
        let h = harness();
        let p = SyncPipeline::new(h.store.clone(), h.publisher.clone(), Arc::new(BrokenMarkets), 2);

        let summary = p.process("test", &[fixture("ok1"), fixture("bad"), fixture("ok2")]).await;
        assert_eq!(summary.new, 2);
        assert_eq!(summary.failed, 1);
        assert!(h.store.get_fixture("ok2").await.unwrap().is_some());
        // Earlier steps of the failed fixture stay applied.
        assert!(h.store.get_fixture("bad").await.unwrap().is_some());
        assert!(h.store.get_markets("bad").await.unwrap().is_none());
    }

    /// Cache wrapper that records how many reads are in flight at once.
    struct SlowCache {
        inner: MemoryCache,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Cache for SlowCache {
        async fn get_raw(&self, key: &str) -> SyncResult<Option<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.get_raw(key).await
        }

        async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> SyncResult<()> {
            self.inner.set_raw(key, value, ttl).await
        }

        async fn del(&self, key: &str) -> SyncResult<()> {
            self.inner.del(key).await
        }

        async fn is_ready(&self) -> bool {
            true
        }

        async fn hash_set(&self, key: &str, field: &str, value: &str) -> SyncResult<()> {
            self.inner.hash_set(key, field, value).await
        }

        async fn hash_get_all(&self, key: &str) -> SyncResult<Vec<(String, String)>> {
            self.inner.hash_get_all(key).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_is_bounded() {
        let h = harness();
        let cache = Arc::new(SlowCache {
            inner: MemoryCache::new(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let store = SnapshotStore::new(cache.clone(), Ttls::default());
        let p = SyncPipeline::new(store, h.publisher.clone(), Arc::new(BookmakerMarkets), 3);

        let batch: Vec<_> =
            (0..20).map(|i| in_league(fixture(&format!("m{i}")), "soccer_epl", &format!("l{i}"), "L")).collect();
        let summary = p.process("test", &batch).await;
        assert_eq!(summary.new, 20);
        assert!(cache.peak.load(Ordering::SeqCst) <= 3);
        assert!(cache.peak.load(Ordering::SeqCst) >= 2);
    }
}
