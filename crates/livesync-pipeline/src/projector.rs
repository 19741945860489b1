//! Legacy per-sport views and the master league catalog.
//!
//! Older readers do not consume diffs; they read pre-grouped lists:
//!
//! | key | content |
//! |---|---|
//! | `leagues:live:<sport>` | leagues with their live match counts |
//! | `leagues:prematch:<sport>` | leagues with their upcoming match counts |
//! | `live:<sport>:<league>` | live fixtures of one league |
//! | `prematch:<sport>:<league>` | upcoming fixtures of one league |
//!
//! League lists are merged monotonically: a league seen before stays listed
//! with a count of 0 rather than disappearing, so menus do not flicker between
//! cycles. Match arrays are rebuilt from the cycle's fixtures for every listed
//! league; a league with nothing in the slice gets an empty array, so fixtures
//! that kicked off or finished leave the view on the next cycle.
//!
//! The master catalog (`catalog:leagues:<sport>`) only ever grows.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use ahash::{AHashMap, AHashSet};
use livesync_core::error::SyncResult;
use livesync_core::store::SnapshotStore;
use livesync_core::{CatalogLeague, FixtureSnapshot, LeagueSummary};
use tracing::{debug, info};

/// Which legacy view a projection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Live,
    Prematch,
}

impl View {
    fn tag(self) -> &'static str {
        match self {
            View::Live => "live",
            View::Prematch => "prematch",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionReport {
    pub sports: usize,
    pub leagues: usize,
    pub match_lists: usize,
}

// ---------------------------------------------------------------------------
// Pure merge helpers
// ---------------------------------------------------------------------------

struct LeagueGroup<'a> {
    league_name: &'a str,
    fixtures: Vec<&'a FixtureSnapshot>,
}

/// sport → league id → fixtures, in input order within each league.
fn group_by_league(fixtures: &[FixtureSnapshot]) -> BTreeMap<&str, BTreeMap<&str, LeagueGroup<'_>>> {
    let mut out: BTreeMap<&str, BTreeMap<&str, LeagueGroup<'_>>> = BTreeMap::new();
    for f in fixtures {
        out.entry(f.sport_key.as_str())
            .or_default()
            .entry(f.league_id.as_str())
            .or_insert_with(|| LeagueGroup { league_name: &f.league_name, fixtures: Vec::new() })
            .fixtures
            .push(f);
    }
    out
}

/// Seed every known league at count 0, then apply the current counts.
///
/// Sorted by count (descending), then name, then id.
pub fn overlay_counts<'a>(
    seeds: impl IntoIterator<Item = (&'a str, &'a str)>,
    current: &[LeagueSummary],
) -> Vec<LeagueSummary> {
    let mut merged: AHashMap<String, LeagueSummary> = AHashMap::new();
    for (league_id, league_name) in seeds {
        merged.entry(league_id.to_string()).or_insert_with(|| LeagueSummary {
            league_id: league_id.to_string(),
            league_name: league_name.to_string(),
            match_count: 0,
        });
    }
    for league in current {
        merged.insert(league.league_id.clone(), league.clone());
    }

    let mut out: Vec<LeagueSummary> = merged.into_values().collect();
    out.sort_by(|a, b| {
        b.match_count
            .cmp(&a.match_count)
            .then_with(|| a.league_name.cmp(&b.league_name))
            .then_with(|| a.league_id.cmp(&b.league_id))
    });
    out
}

/// One league's match array: input order, a repeated id keeps its first
/// position and its last value.
pub fn match_list(fixtures: &[&FixtureSnapshot]) -> Vec<FixtureSnapshot> {
    let mut out: Vec<FixtureSnapshot> = Vec::with_capacity(fixtures.len());
    let mut positions: AHashMap<&str, usize> = AHashMap::new();
    for f in fixtures {
        match positions.get(f.id.as_str()) {
            Some(&i) => out[i] = (*f).clone(),
            None => {
                positions.insert(&f.id, out.len());
                out.push((*f).clone());
            }
        }
    }
    out
}

fn summaries(g: &BTreeMap<&str, LeagueGroup<'_>>) -> Vec<LeagueSummary> {
    g.iter()
        .map(|(id, group)| LeagueSummary {
            league_id: id.to_string(),
            league_name: group.league_name.to_string(),
            match_count: u32::try_from(group.fixtures.len()).unwrap_or(u32::MAX),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Projector
// ---------------------------------------------------------------------------

/// Writes the legacy views and maintains the master catalog.
pub struct LegacyProjector {
    store: SnapshotStore,
    /// Sports projected at least once per view; they keep being refreshed
    /// (with zero counts) after their last fixture disappears.
    seen_live: Mutex<AHashSet<String>>,
    seen_prematch: Mutex<AHashSet<String>>,
}

impl LegacyProjector {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store, seen_live: Mutex::new(AHashSet::new()), seen_prematch: Mutex::new(AHashSet::new()) }
    }

    fn seen(&self, view: View) -> &Mutex<AHashSet<String>> {
        match view {
            View::Live => &self.seen_live,
            View::Prematch => &self.seen_prematch,
        }
    }

    /// Rebuild one view from a cycle's fixtures.
    pub async fn project(&self, view: View, fixtures: &[FixtureSnapshot]) -> SyncResult<ProjectionReport> {
        let groups = group_by_league(fixtures);

        let sports: BTreeSet<String> = {
            let mut seen = self.seen(view).lock().unwrap_or_else(|p| p.into_inner());
            seen.extend(groups.keys().map(|s| s.to_string()));
            seen.iter().cloned().collect()
        };

        let mut report = ProjectionReport::default();
        let no_leagues = BTreeMap::new();
        for sport in &sports {
            let leagues = groups.get(sport.as_str()).unwrap_or(&no_leagues);
            let listed = self.write_league_list(view, sport, &summaries(leagues)).await?;
            report.sports += 1;
            report.leagues += listed.len();

            for league in &listed {
                let matches =
                    leagues.get(league.league_id.as_str()).map(|g| match_list(&g.fixtures)).unwrap_or_default();
                match view {
                    View::Live => self.store.set_live_matches(sport, &league.league_id, &matches).await?,
                    View::Prematch => self.store.set_prematch_matches(sport, &league.league_id, &matches).await?,
                }
                report.match_lists += 1;
            }
        }

        debug!(
            "[{}] projected {} sport(s), {} league(s), {} match list(s)",
            view.tag(),
            report.sports,
            report.leagues,
            report.match_lists
        );
        Ok(report)
    }

    /// Merge and write one sport's league list; returns what was written.
    async fn write_league_list(
        &self,
        view: View,
        sport: &str,
        current: &[LeagueSummary],
    ) -> SyncResult<Vec<LeagueSummary>> {
        let merged = match view {
            View::Live => {
                // Every league with upcoming fixtures is listed in the live menu too.
                let prematch = self.store.get_prematch_leagues(sport).await?;
                let previous = self.store.get_live_leagues(sport).await?;
                let seeds = prematch.iter().chain(&previous).map(|l| (l.league_id.as_str(), l.league_name.as_str()));
                overlay_counts(seeds, current)
            }
            View::Prematch => {
                let previous = self.store.get_prematch_leagues(sport).await?;
                overlay_counts(previous.iter().map(|l| (l.league_id.as_str(), l.league_name.as_str())), current)
            }
        };
        match view {
            View::Live => self.store.set_live_leagues(sport, &merged).await?,
            View::Prematch => self.store.set_prematch_leagues(sport, &merged).await?,
        }
        Ok(merged)
    }

    /// Add leagues not yet in the master catalog. Returns how many were added.
    pub async fn record_catalog(&self, fixtures: &[FixtureSnapshot]) -> SyncResult<usize> {
        let mut added = 0;
        for (sport, leagues) in group_by_league(fixtures) {
            let known: AHashSet<String> =
                self.store.get_master_league_catalog(sport).await?.into_iter().map(|l| l.league_id).collect();
            for (league_id, group) in leagues {
                if known.contains(league_id) {
                    continue;
                }
                let league =
                    CatalogLeague { league_id: league_id.to_string(), league_name: group.league_name.to_string() };
                self.store.add_league_to_master_catalog(sport, &league).await?;
                info!("[catalog] {sport}: new league {} ({})", league.league_id, league.league_name);
                added += 1;
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesync_core::keys;

    use crate::test_support::*;

    fn summary(id: &str, name: &str, n: u32) -> LeagueSummary {
        LeagueSummary { league_id: id.into(), league_name: name.into(), match_count: n }
    }

    #[test]
    fn overlay_keeps_seen_leagues_at_zero() {
        let seeds = [("39", "Premier League"), ("140", "La Liga")];
        let merged = overlay_counts(seeds, &[summary("140", "La Liga", 2), summary("78", "Bundesliga", 1)]);
        assert_eq!(
            merged,
            vec![summary("140", "La Liga", 2), summary("78", "Bundesliga", 1), summary("39", "Premier League", 0)]
        );
    }

    #[test]
    fn match_list_dedups_by_id() {
        let a = fixture("a");
        let b = fixture("b");
        let a2 = live(fixture("a"));
        assert_eq!(match_list(&[&a, &b, &a2]), vec![a2, b]);
    }

    #[tokio::test(start_paused = true)]
    async fn live_view_is_seeded_from_prematch_and_never_shrinks() {
        let h = harness();
        let projector = LegacyProjector::new(h.store.clone());

        let upcoming = vec![
            in_league(fixture("u1"), "soccer_epl", "39", "Premier League"),
            in_league(fixture("u2"), "soccer_epl", "140", "La Liga"),
        ];
        projector.project(View::Prematch, &upcoming).await.unwrap();

        let in_play = vec![live(in_league(fixture("l1"), "soccer_epl", "140", "La Liga"))];
        let report = projector.project(View::Live, &in_play).await.unwrap();
        assert_eq!(report, ProjectionReport { sports: 1, leagues: 2, match_lists: 2 });

        let leagues = h.store.get_live_leagues("soccer_epl").await.unwrap();
        assert_eq!(leagues, vec![summary("140", "La Liga", 1), summary("39", "Premier League", 0)]);
        assert_eq!(h.store.get_live_matches("soccer_epl", "140").await.unwrap().len(), 1);
        assert!(h.store.get_live_matches("soccer_epl", "39").await.unwrap().is_empty());
        assert_eq!(h.cache.ttl("leagues:live:soccer_epl"), Some(keys::LIVE_VIEW_TTL));

        // Nothing live any more: the sport is still refreshed, counts drop to zero.
        projector.project(View::Live, &[]).await.unwrap();
        let leagues = h.store.get_live_leagues("soccer_epl").await.unwrap();
        assert_eq!(leagues.len(), 2);
        assert!(leagues.iter().all(|l| l.match_count == 0));
        // The finished match leaves the array.
        assert!(h.store.get_live_matches("soccer_epl", "140").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn prematch_arrays_hold_only_the_current_slice() {
        let h = harness();
        let projector = LegacyProjector::new(h.store.clone());

        for cycle in 0..50 {
            let slice: Vec<_> = (0..10).map(|i| fixture(&format!("c{cycle}-{i}"))).collect();
            projector.project(View::Prematch, &slice).await.unwrap();
        }

        let ids: Vec<String> =
            h.store.get_prematch_matches("soccer_epl", "39").await.unwrap().into_iter().map(|f| f.id).collect();
        assert_eq!(ids.len(), 10);
        assert!(ids.iter().all(|id| id.starts_with("c49-")));
        assert_eq!(h.cache.ttl("prematch:soccer_epl:39"), Some(keys::PREMATCH_VIEW_TTL));
        let leagues = h.store.get_prematch_leagues("soccer_epl").await.unwrap();
        assert_eq!(leagues, vec![summary("39", "Premier League", 10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn kicked_off_fixtures_leave_the_prematch_array() {
        let h = harness();
        let projector = LegacyProjector::new(h.store.clone());
        projector.project(View::Prematch, &[fixture("a"), fixture("b")]).await.unwrap();
        projector.project(View::Prematch, &[fixture("b")]).await.unwrap();

        let ids: Vec<String> =
            h.store.get_prematch_matches("soccer_epl", "39").await.unwrap().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, ["b"]);

        // League drops to zero: still listed, array emptied.
        projector.project(View::Prematch, &[]).await.unwrap();
        assert!(h.store.get_prematch_matches("soccer_epl", "39").await.unwrap().is_empty());
        assert_eq!(h.store.get_prematch_leagues("soccer_epl").await.unwrap(), vec![summary("39", "Premier League", 0)]);
    }

    #[tokio::test]
    async fn catalog_only_grows_and_skips_known_leagues() {
        let h = harness();
        let projector = LegacyProjector::new(h.store.clone());
        let batch = vec![
            in_league(fixture("a"), "soccer_epl", "39", "Premier League"),
            in_league(fixture("b"), "soccer_epl", "39", "Premier League"),
            in_league(fixture("c"), "tennis_atp", "atp", "ATP"),
        ];
        assert_eq!(projector.record_catalog(&batch).await.unwrap(), 2);

        let writes = h.cache.writes();
        assert_eq!(projector.record_catalog(&batch).await.unwrap(), 0);
        assert_eq!(h.cache.writes(), writes);

        projector.record_catalog(&[in_league(fixture("d"), "soccer_epl", "140", "La Liga")]).await.unwrap();
        let cat = h.store.get_master_league_catalog("soccer_epl").await.unwrap();
        let ids: Vec<&str> = cat.iter().map(|l| l.league_id.as_str()).collect();
        assert_eq!(ids, ["140", "39"]);
    }
}
