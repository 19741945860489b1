//! League and sport summaries used by the menu/read paths.

use serde::{Deserialize, Serialize};

/// One row of a per-sport league list (`leagues:live:<sport>` /
/// `leagues:prematch:<sport>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueSummary {
    pub league_id: String,
    pub league_name: String,
    pub match_count: u32,
}

/// One entry of the master league catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogLeague {
    pub league_id: String,
    pub league_name: String,
}

/// One sport from the upstream sports list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportInfo {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
