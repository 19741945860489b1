//! Unified reader wire format and its translation into [`FixtureSnapshot`].
//!
//! The unified reader merges the third-party feed with manually managed
//! matches. Its records follow the odds-feed layout (`sport_key`,
//! `commence_time`, `bookmakers[].markets[].outcomes[]`) with a few optional
//! extras (`league_id`, `status`, flat `odds`/`scores` objects). Anything
//! optional is filled in here so downstream code only ever sees a complete
//! snapshot.

use livesync_core::{FixtureSnapshot, FixtureSource, FixtureStatus, MarketStatus, Odds, Scores};
use serde::Deserialize;
use serde_json::Value;

use crate::json_util::{id_string, parse_f64_field, parse_str_i64, str_field};

/// Market key carrying 1X2 / moneyline prices in bookmaker blocks.
pub const H2H_MARKET: &str = "h2h";

/// One fixture as served by the unified reader.
#[derive(Debug, Clone, Deserialize)]
pub struct UnifiedFixture {
    pub id: Value,
    pub sport_key: String,
    #[serde(default)]
    pub sport_title: Option<String>,
    #[serde(default)]
    pub league_id: Value,
    #[serde(default)]
    pub league_name: Option<String>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub commence_time: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Odds-feed style completion flag.
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub market_status: Option<String>,
    /// `{home, away}` or the odds-feed `[{name, score}]` form.
    #[serde(default)]
    pub scores: Option<Value>,
    /// Flat `{home, draw?, away}` prices; falls back to the `h2h` market.
    #[serde(default)]
    pub odds: Option<Value>,
    #[serde(default)]
    pub bookmakers: Vec<Value>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub is_manual: bool,
}

impl UnifiedFixture {
    /// Translate into the canonical snapshot. `None` if the record has no
    /// usable id.
    pub fn into_snapshot(self) -> Option<FixtureSnapshot> {
        let id = id_string(&self.id)?;

        let status = if self.completed {
            FixtureStatus::Completed
        } else {
            self.status.as_deref().map(parse_status).unwrap_or_default()
        };
        let market_status = self
            .market_status
            .as_deref()
            .and_then(MarketStatus::parse)
            .unwrap_or(if status == FixtureStatus::Completed { MarketStatus::Closed } else { MarketStatus::Open });

        // A feed record without league metadata is filed under its sport.
        let league_id = id_string(&self.league_id).unwrap_or_else(|| self.sport_key.clone());
        let league_name = self
            .league_name
            .clone()
            .or_else(|| self.sport_title.clone())
            .unwrap_or_else(|| league_id.clone());

        let scores = self.scores.as_ref().and_then(|s| parse_scores(s, &self.home_team, &self.away_team));
        let odds = self
            .odds
            .as_ref()
            .and_then(parse_flat_odds)
            .or_else(|| h2h_odds(&self.bookmakers, &self.home_team, &self.away_team));

        let manual = self.is_manual || self.source.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("manual"));
        let source = if manual { FixtureSource::Manual } else { FixtureSource::Feed };

        Some(
            FixtureSnapshot::builder(id, self.sport_key)
                .league(league_id, league_name)
                .teams(self.home_team, self.away_team)
                .commence_time(self.commence_time)
                .status(status)
                .market_status(market_status)
                .scores(scores)
                .odds(odds)
                .bookmakers(self.bookmakers)
                .source(source)
                .build(),
        )
    }
}

/// Map upstream status vocabularies onto the three lifecycle states.
pub fn parse_status(s: &str) -> FixtureStatus {
    match s.trim().to_ascii_lowercase().as_str() {
        "live" | "in_play" | "inplay" | "in_progress" | "started" => FixtureStatus::Live,
        "completed" | "finished" | "ended" | "closed" | "settled" => FixtureStatus::Completed,
        _ => FixtureStatus::Upcoming,
    }
}

fn parse_scores(v: &Value, home_team: &str, away_team: &str) -> Option<Scores> {
    if let Some(list) = v.as_array() {
        let score_of = |team: &str| {
            list.iter()
                .find(|e| str_field(e, "name") == Some(team))
                .and_then(|e| parse_str_i64(e.get("score")))
        };
        return Some(Scores { home: score_of(home_team)?, away: score_of(away_team)? });
    }
    Some(Scores { home: parse_str_i64(v.get("home"))?, away: parse_str_i64(v.get("away"))? })
}

fn parse_flat_odds(v: &Value) -> Option<Odds> {
    Some(Odds {
        home: parse_f64_field(v, "home")?,
        draw: parse_f64_field(v, "draw"),
        away: parse_f64_field(v, "away")?,
    })
}

/// 1X2 prices from the first bookmaker that quotes an `h2h` market.
pub fn h2h_odds(bookmakers: &[Value], home_team: &str, away_team: &str) -> Option<Odds> {
    bookmakers.iter().find_map(|bm| {
        let market = bm
            .get("markets")?
            .as_array()?
            .iter()
            .find(|m| str_field(m, "key") == Some(H2H_MARKET))?;
        let outcomes = market.get("outcomes")?.as_array()?;
        let price_of = |pred: &dyn Fn(&str) -> bool| {
            outcomes
                .iter()
                .find(|o| str_field(o, "name").is_some_and(pred))
                .and_then(|o| parse_f64_field(o, "price"))
        };
        Some(Odds {
            home: price_of(&|n| n == home_team)?,
            draw: price_of(&|n| n.eq_ignore_ascii_case("draw")),
            away: price_of(&|n| n == away_team)?,
        })
    })
}
