//! Persisted key patterns and default TTLs.
//!
//! These names are a contract with the read side (hydration API, menus), so
//! they live in one place.
//!
//! | key pattern                 | content                          | TTL        |
//! |-----------------------------|----------------------------------|------------|
//! | `fixture:<id>`              | canonical snapshot               | 3600 s     |
//! | `league:<id>:fixtures`      | fixture-id array                 | 3600 s     |
//! | `live:<sport>:<league>`     | live match array                 | 300 s      |
//! | `prematch:<sport>:<league>` | upcoming match array             | 900 s      |
//! | `match:markets:<id>`        | generated markets + timestamp    | 120/300 s  |
//! | `leagues:live:<sport>`      | live league list                 | 300 s      |
//! | `leagues:prematch:<sport>`  | prematch league list             | 900 s      |
//! | `catalog:leagues:<sport>`   | hash league_id -> league_name    | none       |
//! | `sports:list`               | sports list                      | 3600 s     |

use std::time::Duration;

use crate::config::StoreConfig;

pub const FIXTURE_TTL: Duration = Duration::from_secs(3_600);
pub const LEAGUE_INDEX_TTL: Duration = Duration::from_secs(3_600);
pub const LIVE_VIEW_TTL: Duration = Duration::from_secs(300);
pub const PREMATCH_VIEW_TTL: Duration = Duration::from_secs(900);
pub const LIVE_MARKETS_TTL: Duration = Duration::from_secs(120);
pub const UPCOMING_MARKETS_TTL: Duration = Duration::from_secs(300);
pub const SPORTS_TTL: Duration = Duration::from_secs(3_600);

pub const SPORTS_LIST: &str = "sports:list";

pub fn fixture(id: &str) -> String {
    format!("fixture:{id}")
}

pub fn league_fixtures(league_id: &str) -> String {
    format!("league:{league_id}:fixtures")
}

pub fn live_matches(sport: &str, league_id: &str) -> String {
    format!("live:{sport}:{league_id}")
}

pub fn prematch_matches(sport: &str, league_id: &str) -> String {
    format!("prematch:{sport}:{league_id}")
}

pub fn match_markets(id: &str) -> String {
    format!("match:markets:{id}")
}

pub fn live_leagues(sport: &str) -> String {
    format!("leagues:live:{sport}")
}

pub fn prematch_leagues(sport: &str) -> String {
    format!("leagues:prematch:{sport}")
}

pub fn master_catalog(sport: &str) -> String {
    format!("catalog:leagues:{sport}")
}

/// Effective TTLs, resolved once from [`StoreConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Ttls {
    pub fixture: Duration,
    pub league_index: Duration,
    pub live_view: Duration,
    pub prematch_view: Duration,
    pub live_markets: Duration,
    pub upcoming_markets: Duration,
    pub sports: Duration,
}

impl Default for Ttls {
    fn default() -> Self {
        Self {
            fixture: FIXTURE_TTL,
            league_index: LEAGUE_INDEX_TTL,
            live_view: LIVE_VIEW_TTL,
            prematch_view: PREMATCH_VIEW_TTL,
            live_markets: LIVE_MARKETS_TTL,
            upcoming_markets: UPCOMING_MARKETS_TTL,
            sports: SPORTS_TTL,
        }
    }
}

impl Ttls {
    pub fn from_config(cfg: &StoreConfig) -> Self {
        let secs = |v: Option<u64>, d: Duration| v.map(Duration::from_secs).unwrap_or(d);
        Self {
            fixture: secs(cfg.fixture_ttl_sec, FIXTURE_TTL),
            league_index: secs(cfg.league_index_ttl_sec, LEAGUE_INDEX_TTL),
            live_view: secs(cfg.live_view_ttl_sec, LIVE_VIEW_TTL),
            prematch_view: secs(cfg.prematch_view_ttl_sec, PREMATCH_VIEW_TTL),
            live_markets: secs(cfg.live_markets_ttl_sec, LIVE_MARKETS_TTL),
            upcoming_markets: secs(cfg.upcoming_markets_ttl_sec, UPCOMING_MARKETS_TTL),
            sports: secs(cfg.sports_ttl_sec, SPORTS_TTL),
        }
    }
}
