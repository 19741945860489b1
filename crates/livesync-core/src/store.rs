//! Typed snapshot, index, and catalog accessors over a [`Cache`].
//!
//! [`SnapshotStore`] is the single owner of key naming and TTL choice: the
//! pipeline never formats a key itself. Values are JSON via `serde_json`.
//!
//! Consistency is per-key last-write-wins. Read-modify-write helpers such as
//! [`SnapshotStore::index_fixture`] can race between overlapping cycles; the
//! master catalog avoids that by living in a hash, so concurrent additions of
//! different leagues never clobber each other.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::cache::Cache;
use crate::error::SyncResult;
use crate::keys::{self, Ttls};
use crate::types::{CatalogLeague, FixtureSnapshot, LeagueSummary, SportInfo};

/// Derived markets cached per fixture at `match:markets:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMarkets {
    pub markets: Vec<Value>,
    /// Epoch milliseconds.
    pub generated_at: u64,
}

/// Typed façade over the shared cache.
#[derive(Clone)]
pub struct SnapshotStore {
    cache: Arc<dyn Cache>,
    ttls: Ttls,
}

impl SnapshotStore {
    pub fn new(cache: Arc<dyn Cache>, ttls: Ttls) -> Self {
        Self { cache, ttls }
    }

    pub fn ttls(&self) -> &Ttls {
        &self.ttls
    }

    // -----------------------------------------------------------------------
    // Generic typed access
    // -----------------------------------------------------------------------

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Option<T>> {
        match self.cache.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> SyncResult<()> {
        let raw = serde_json::to_string(value)?;
        self.cache.set_raw(key, raw, ttl).await
    }

    pub async fn del(&self, key: &str) -> SyncResult<()> {
        self.cache.del(key).await
    }

    pub async fn is_ready(&self) -> bool {
        self.cache.is_ready().await
    }

    // -----------------------------------------------------------------------
    // Fixtures + league index
    // -----------------------------------------------------------------------

    /// Previous snapshot for a fixture.
    ///
    /// A value that no longer decodes is treated as absent (and logged) so the
    /// fixture is re-seeded with a fresh `new` diff instead of failing every
    /// cycle until the key expires.
    pub async fn get_fixture(&self, id: &str) -> SyncResult<Option<FixtureSnapshot>> {
        let key = keys::fixture(id);
        let Some(raw) = self.cache.get_raw(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(snap) => Ok(Some(snap)),
            Err(e) => {
                warn!("[store] undecodable snapshot at {key}, treating as absent: {e}");
                Ok(None)
            }
        }
    }

    pub async fn put_fixture(&self, snap: &FixtureSnapshot) -> SyncResult<()> {
        self.set(&keys::fixture(&snap.id), snap, Some(self.ttls.fixture)).await
    }

    /// Fixture ids ever indexed under a league (within the TTL window).
    pub async fn league_fixture_ids(&self, league_id: &str) -> SyncResult<Vec<String>> {
        Ok(self.get(&keys::league_fixtures(league_id)).await?.unwrap_or_default())
    }

    /// Append a fixture id to its league index and refresh the index TTL.
    pub async fn index_fixture(&self, league_id: &str, fixture_id: &str) -> SyncResult<()> {
        let mut ids = self.league_fixture_ids(league_id).await?;
        if !ids.iter().any(|id| id == fixture_id) {
            ids.push(fixture_id.to_string());
        }
        self.set(&keys::league_fixtures(league_id), &ids, Some(self.ttls.league_index)).await
    }

    // -----------------------------------------------------------------------
    // Derived markets
    // -----------------------------------------------------------------------

    pub async fn get_markets(&self, fixture_id: &str) -> SyncResult<Option<CachedMarkets>> {
        self.get(&keys::match_markets(fixture_id)).await
    }

    /// Cache generated markets; live fixtures get the shorter TTL.
    pub async fn put_markets(&self, fixture_id: &str, markets: &CachedMarkets, live: bool) -> SyncResult<()> {
        let ttl = if live { self.ttls.live_markets } else { self.ttls.upcoming_markets };
        self.set(&keys::match_markets(fixture_id), markets, Some(ttl)).await
    }

    // -----------------------------------------------------------------------
    // Legacy per-sport views
    // -----------------------------------------------------------------------

    pub async fn get_live_leagues(&self, sport: &str) -> SyncResult<Vec<LeagueSummary>> {
        Ok(self.get(&keys::live_leagues(sport)).await?.unwrap_or_default())
    }

    pub async fn set_live_leagues(&self, sport: &str, leagues: &[LeagueSummary]) -> SyncResult<()> {
        self.set(&keys::live_leagues(sport), leagues, Some(self.ttls.live_view)).await
    }

    pub async fn get_prematch_leagues(&self, sport: &str) -> SyncResult<Vec<LeagueSummary>> {
        Ok(self.get(&keys::prematch_leagues(sport)).await?.unwrap_or_default())
    }

    pub async fn set_prematch_leagues(&self, sport: &str, leagues: &[LeagueSummary]) -> SyncResult<()> {
        self.set(&keys::prematch_leagues(sport), leagues, Some(self.ttls.prematch_view)).await
    }

    pub async fn get_live_matches(&self, sport: &str, league_id: &str) -> SyncResult<Vec<FixtureSnapshot>> {
        Ok(self.get(&keys::live_matches(sport, league_id)).await?.unwrap_or_default())
    }

    pub async fn set_live_matches(&self, sport: &str, league_id: &str, matches: &[FixtureSnapshot]) -> SyncResult<()> {
        self.set(&keys::live_matches(sport, league_id), matches, Some(self.ttls.live_view)).await
    }

    pub async fn get_prematch_matches(&self, sport: &str, league_id: &str) -> SyncResult<Vec<FixtureSnapshot>> {
        Ok(self.get(&keys::prematch_matches(sport, league_id)).await?.unwrap_or_default())
    }

    pub async fn set_prematch_matches(
        &self,
        sport: &str,
        league_id: &str,
        matches: &[FixtureSnapshot],
    ) -> SyncResult<()> {
        self.set(&keys::prematch_matches(sport, league_id), matches, Some(self.ttls.prematch_view)).await
    }

    // -----------------------------------------------------------------------
    // Master league catalog
    // -----------------------------------------------------------------------

    /// Every league ever recorded for a sport, sorted by id.
    pub async fn get_master_league_catalog(&self, sport: &str) -> SyncResult<Vec<CatalogLeague>> {
        let mut leagues: Vec<CatalogLeague> = self
            .cache
            .hash_get_all(&keys::master_catalog(sport))
            .await?
            .into_iter()
            .map(|(league_id, league_name)| CatalogLeague { league_id, league_name })
            .collect();
        leagues.sort();
        Ok(leagues)
    }

    /// Add (or rename) one league. Leagues are never removed here.
    pub async fn add_league_to_master_catalog(&self, sport: &str, league: &CatalogLeague) -> SyncResult<()> {
        self.cache.hash_set(&keys::master_catalog(sport), &league.league_id, &league.league_name).await
    }

    // -----------------------------------------------------------------------
    // Sports list
    // -----------------------------------------------------------------------

    pub async fn get_sports(&self) -> SyncResult<Vec<SportInfo>> {
        Ok(self.get(keys::SPORTS_LIST).await?.unwrap_or_default())
    }

    pub async fn set_sports(&self, sports: &[SportInfo]) -> SyncResult<()> {
        self.set(keys::SPORTS_LIST, sports, Some(self.ttls.sports)).await
    }
}
