//! Manually managed matches: row types, translation, and the adapter that
//! fetches rows plus their markets.
//!
//! Manual matches live in an operator-facing store with its own vocabulary
//! (`home_team_name`, `start_time`, markets with `outcomes[{key, label, odds}]`).
//! [`translate`] maps one row and its markets onto a [`FixtureSnapshot`] with
//! the id namespaced as `manual_<row id>`, the same id the unified reader
//! uses for that match.

use std::sync::Arc;

use anyhow::Result;
use futures_util::stream::{self, StreamExt};
use livesync_core::{FixtureSnapshot, FixtureSource, FixtureStatus, MarketStatus, Odds, Scores};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::ManualStore;
use crate::json_util::{id_string, parse_str_f64, parse_str_i64};
use crate::pipeline::DEFAULT_CONCURRENCY;

/// Prefix applied to manual row ids.
pub const MANUAL_ID_PREFIX: &str = "manual_";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// One manual match row.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualMatchRow {
    pub id: Value,
    /// Sport key, e.g. `soccer_epl`.
    pub sport: String,
    #[serde(default)]
    pub league_id: Value,
    #[serde(default)]
    pub league_name: Option<String>,
    pub home_team_name: String,
    pub away_team_name: String,
    #[serde(default)]
    pub start_time: String,
    /// `scheduled | live | finished` (anything unknown reads as upcoming).
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub home_score: Value,
    #[serde(default)]
    pub away_score: Value,
}

/// One market attached to a manual match.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualMarket {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub outcomes: Vec<ManualOutcome>,
}

impl ManualMarket {
    /// Market identifier: `key`, falling back to `type`.
    pub fn market_key(&self) -> &str {
        self.key.as_deref().or(self.kind.as_deref()).unwrap_or("unknown")
    }
}

/// One priced outcome of a manual market.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualOutcome {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub odds: Value,
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Namespaced fixture id for a manual row id.
pub fn manual_fixture_id(row_id: &str) -> String {
    if row_id.starts_with(MANUAL_ID_PREFIX) {
        row_id.to_string()
    } else {
        format!("{MANUAL_ID_PREFIX}{row_id}")
    }
}

fn row_status(s: &str) -> FixtureStatus {
    match s.trim().to_ascii_lowercase().as_str() {
        "live" => FixtureStatus::Live,
        "finished" => FixtureStatus::Completed,
        _ => FixtureStatus::Upcoming,
    }
}

/// 1X2 prices from the first market carrying both a home and an away outcome.
///
/// Outcome keys are matched case-insensitively: `home`/`1`, `draw`/`x`,
/// `away`/`2`.
pub fn extract_1x2(markets: &[ManualMarket]) -> Option<Odds> {
    markets.iter().find_map(|m| {
        let price = |keys: [&str; 2]| {
            m.outcomes
                .iter()
                .find(|o| keys.iter().any(|k| o.key.trim().eq_ignore_ascii_case(k)))
                .and_then(|o| parse_str_f64(Some(&o.odds)))
        };
        Some(Odds { home: price(["home", "1"])?, draw: price(["draw", "x"]), away: price(["away", "2"])? })
    })
}

/// Group manual markets into one synthetic bookmaker block so they travel in
/// the same shape as feed bookmakers.
fn bookmaker_block(markets: &[ManualMarket]) -> Vec<Value> {
    if markets.is_empty() {
        return Vec::new();
    }
    let markets: Vec<Value> = markets
        .iter()
        .map(|m| {
            let outcomes: Vec<Value> = m
                .outcomes
                .iter()
                .map(|o| {
                    let name = if o.label.is_empty() { &o.key } else { &o.label };
                    json!({"key": o.key, "name": name, "price": parse_str_f64(Some(&o.odds))})
                })
                .collect();
            json!({"key": m.market_key(), "status": m.status, "outcomes": outcomes})
        })
        .collect();
    vec![json!({"key": "manual", "title": "Manual", "markets": markets})]
}

/// Translate one manual row plus its markets. `None` if the row has no id.
pub fn translate(row: &ManualMatchRow, markets: &[ManualMarket]) -> Option<FixtureSnapshot> {
    let id = manual_fixture_id(&id_string(&row.id)?);
    let status = row_status(&row.status);

    let market_status = if status == FixtureStatus::Completed {
        MarketStatus::Closed
    } else {
        markets
            .first()
            .and_then(|m| m.status.as_deref())
            .and_then(MarketStatus::parse)
            .unwrap_or_default()
    };

    let scores = match (parse_str_i64(Some(&row.home_score)), parse_str_i64(Some(&row.away_score))) {
        (Some(home), Some(away)) => Some(Scores { home, away }),
        _ => None,
    };

    let league_id = id_string(&row.league_id).unwrap_or_else(|| row.sport.clone());
    let league_name = row.league_name.clone().unwrap_or_else(|| league_id.clone());

    Some(
        FixtureSnapshot::builder(id, row.sport.clone())
            .league(league_id, league_name)
            .teams(row.home_team_name.clone(), row.away_team_name.clone())
            .commence_time(row.start_time.clone())
            .status(status)
            .market_status(market_status)
            .scores(scores)
            .odds(extract_1x2(markets))
            .bookmakers(bookmaker_block(markets))
            .source(FixtureSource::Manual)
            .build(),
    )
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Fetches live and upcoming manual rows and their markets, and translates
/// them into snapshots.
pub struct ManualAdapter {
    store: Arc<dyn ManualStore>,
    concurrency: usize,
}

impl ManualAdapter {
    pub fn new(store: Arc<dyn ManualStore>) -> Self {
        Self { store, concurrency: DEFAULT_CONCURRENCY }
    }

    /// Cap on market queries in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// All live and upcoming manual fixtures.
    ///
    /// Either row query failing fails the fetch. A market query failing only
    /// degrades that match to no markets.
    pub async fn fetch_all(&self) -> Result<Vec<FixtureSnapshot>> {
        let (live, upcoming) = tokio::try_join!(self.store.live_matches(), self.store.upcoming_matches())?;
        debug!("[manual] fetched {} live + {} upcoming rows", live.len(), upcoming.len());

        let rows: Vec<ManualMatchRow> = live.into_iter().chain(upcoming).collect();
        let fetches = stream::iter(rows).map(|row| async move {
            let Some(row_id) = id_string(&row.id) else {
                warn!("[manual] skipping row without id");
                return None;
            };
            let markets = match self.store.markets(&row_id).await {
                Ok(m) => m,
                Err(e) => {
                    warn!("[manual] markets for {row_id} unavailable, continuing without: {e:#}");
                    Vec::new()
                }
            };
            translate(&row, &markets)
        });

        let fixtures: Vec<Option<FixtureSnapshot>> = fetches.buffered(self.concurrency).collect().await;
        Ok(fixtures.into_iter().flatten().collect())
    }
}
