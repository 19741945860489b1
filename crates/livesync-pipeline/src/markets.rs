//! Derived market generation.
//!
//! Market math lives outside this service; [`MarketGenerator`] is the seam it
//! plugs into. The pipeline calls it once per fixture that produced a diff and
//! caches the result at `match:markets:<id>`.

use anyhow::Result;
use livesync_core::FixtureSnapshot;
use serde_json::{Value, json};

use crate::sources::unified::H2H_MARKET;

pub trait MarketGenerator: Send + Sync {
    fn generate(&self, fixture: &FixtureSnapshot) -> Result<Vec<Value>>;
}

/// Passes through the first bookmaker's `markets` array.
///
/// A fixture with flat odds but no bookmaker block gets a single synthetic
/// `h2h` market so readers always find 1X2 prices in the same place.
#[derive(Debug, Default, Clone, Copy)]
pub struct BookmakerMarkets;

impl MarketGenerator for BookmakerMarkets {
    fn generate(&self, fixture: &FixtureSnapshot) -> Result<Vec<Value>> {
        if let Some(markets) = fixture
            .bookmakers
            .first()
            .and_then(|bm| bm.get("markets"))
            .and_then(Value::as_array)
        {
            return Ok(markets.clone());
        }

        let Some(odds) = fixture.odds else {
            return Ok(Vec::new());
        };
        let mut outcomes = vec![json!({"name": fixture.home_team, "price": odds.home})];
        if let Some(draw) = odds.draw {
            outcomes.push(json!({"name": "Draw", "price": draw}));
        }
        outcomes.push(json!({"name": fixture.away_team, "price": odds.away}));
        Ok(vec![json!({"key": H2H_MARKET, "outcomes": outcomes})])
    }
}
