//! Canonical fixture snapshot and its enums.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Lifecycle enums
// ---------------------------------------------------------------------------

/// Match lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FixtureStatus {
    #[default]
    Upcoming,
    Live,
    Completed,
}

impl FixtureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Live => "live",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Betting market status for the fixture as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    #[default]
    Open,
    Suspended,
    Closed,
}

impl MarketStatus {
    /// Lenient parse used by source adapters. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "active" => Some(Self::Open),
            "suspended" | "paused" => Some(Self::Suspended),
            "closed" | "settled" | "finished" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Where a snapshot originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FixtureSource {
    #[default]
    Feed,
    Manual,
}

// ---------------------------------------------------------------------------
// Scores / odds
// ---------------------------------------------------------------------------

/// Current score line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub home: i64,
    pub away: i64,
}

/// Absolute difference above which two quotes are considered different.
pub const ODDS_TOLERANCE: f64 = 0.01;

/// 1X2 decimal odds. `draw` is absent for two-way sports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    pub home: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw: Option<f64>,
    pub away: f64,
}

impl Odds {
    /// `true` if any outcome moved by more than [`ODDS_TOLERANCE`], or the
    /// draw outcome appeared/disappeared. The three prices are judged as one
    /// unit.
    pub fn differs_from(&self, other: &Odds) -> bool {
        let moved = |a: f64, b: f64| (a - b).abs() > ODDS_TOLERANCE;
        if moved(self.home, other.home) || moved(self.away, other.away) {
            return true;
        }
        match (self.draw, other.draw) {
            (Some(a), Some(b)) => moved(a, b),
            (None, None) => false,
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// FixtureSnapshot
// ---------------------------------------------------------------------------

/// The canonical state of one fixture at one instant.
///
/// Exactly one snapshot per fixture id lives in the store (`fixture:<id>`), and
/// it is the only thing the diff engine compares against. Team names, league
/// metadata and bookmaker blocks are carried but never diffed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSnapshot {
    pub id: String,
    pub sport_key: String,
    pub league_id: String,
    pub league_name: String,
    pub home_team: String,
    pub away_team: String,
    /// RFC 3339 start time, compared as an exact string.
    pub commence_time: String,
    pub status: FixtureStatus,
    pub market_status: MarketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds: Option<Odds>,
    /// Opaque bookmaker/market blocks, passed through untouched.
    #[serde(default)]
    pub bookmakers: Vec<Value>,
    pub source: FixtureSource,
    #[serde(default)]
    pub is_manual: bool,
}

impl FixtureSnapshot {
    /// Start building a snapshot with every field at its neutral default.
    pub fn builder(id: impl Into<String>, sport_key: impl Into<String>) -> FixtureBuilder {
        FixtureBuilder {
            inner: FixtureSnapshot {
                id: id.into(),
                sport_key: sport_key.into(),
                league_id: String::new(),
                league_name: String::new(),
                home_team: String::new(),
                away_team: String::new(),
                commence_time: String::new(),
                status: FixtureStatus::Upcoming,
                market_status: MarketStatus::Open,
                scores: None,
                odds: None,
                bookmakers: Vec::new(),
                source: FixtureSource::Feed,
                is_manual: false,
            },
        }
    }

    /// Pub/sub channel this fixture's diffs are published on.
    pub fn channel(&self) -> String {
        sport_channel(&self.sport_key)
    }

    pub fn is_live(&self) -> bool {
        self.status == FixtureStatus::Live
    }
}

/// Channel name for a sport key (`sports:<sport_key>`).
pub fn sport_channel(sport_key: &str) -> String {
    format!("sports:{sport_key}")
}

/// Typed builder for [`FixtureSnapshot`]; each source adapter translates
/// through it instead of merging loose JSON.
#[derive(Debug, Clone)]
pub struct FixtureBuilder {
    inner: FixtureSnapshot,
}

impl FixtureBuilder {
    pub fn league(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.inner.league_id = id.into();
        self.inner.league_name = name.into();
        self
    }

    pub fn teams(mut self, home: impl Into<String>, away: impl Into<String>) -> Self {
        self.inner.home_team = home.into();
        self.inner.away_team = away.into();
        self
    }

    pub fn commence_time(mut self, t: impl Into<String>) -> Self {
        self.inner.commence_time = t.into();
        self
    }

    pub fn status(mut self, status: FixtureStatus) -> Self {
        self.inner.status = status;
        self
    }

    pub fn market_status(mut self, status: MarketStatus) -> Self {
        self.inner.market_status = status;
        self
    }

    pub fn scores(mut self, scores: Option<Scores>) -> Self {
        self.inner.scores = scores;
        self
    }

    pub fn odds(mut self, odds: Option<Odds>) -> Self {
        self.inner.odds = odds;
        self
    }

    pub fn bookmakers(mut self, bookmakers: Vec<Value>) -> Self {
        self.inner.bookmakers = bookmakers;
        self
    }

    /// Sets both the source tag and the manual flag.
    pub fn source(mut self, source: FixtureSource) -> Self {
        self.inner.source = source;
        self.inner.is_manual = source == FixtureSource::Manual;
        self
    }

    pub fn build(self) -> FixtureSnapshot {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odds_tolerance_band() {
        let a = Odds { home: 2.00, draw: Some(3.00), away: 3.50 };
        let jitter = Odds { home: 2.005, draw: Some(2.995), away: 3.509 };
        assert!(!a.differs_from(&jitter));

        let moved = Odds { home: 2.0101, ..a };
        assert!(a.differs_from(&moved));
    }

    #[test]
    fn odds_draw_presence_counts() {
        let three_way = Odds { home: 1.5, draw: Some(4.0), away: 6.0 };
        let two_way = Odds { draw: None, ..three_way };
        assert!(three_way.differs_from(&two_way));
        assert!(!two_way.differs_from(&two_way));
    }

    #[test]
    fn snapshot_json_shape() {
        let snap = FixtureSnapshot::builder("m1", "soccer_epl")
            .league("39", "Premier League")
            .teams("Arsenal", "Chelsea")
            .commence_time("2026-10-19T15:00:00Z")
            .odds(Some(Odds { home: 2.0, draw: Some(3.0), away: 3.5 }))
            .source(FixtureSource::Manual)
            .build();

        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["status"], "upcoming");
        assert_eq!(v["market_status"], "open");
        assert_eq!(v["source"], "manual");
        assert_eq!(v["is_manual"], true);
        assert!(v.get("scores").is_none());
        assert_eq!(snap.channel(), "sports:soccer_epl");

        let back: FixtureSnapshot = serde_json::from_value(v).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn market_status_parse_is_lenient() {
        assert_eq!(MarketStatus::parse(" Suspended "), Some(MarketStatus::Suspended));
        assert_eq!(MarketStatus::parse("settled"), Some(MarketStatus::Closed));
        assert_eq!(MarketStatus::parse("weird"), None);
    }
}
