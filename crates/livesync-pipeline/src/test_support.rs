//! Shared fixtures for the in-crate tests.

use std::sync::Arc;

use livesync_core::cache::MemoryCache;
use livesync_core::keys::Ttls;
use livesync_core::store::SnapshotStore;
use livesync_core::transport::MemoryTransport;
use livesync_core::{FixtureSnapshot, FixtureStatus, Odds};
use serde_json::Value;

use crate::publisher::{BatchPublisher, PublisherSettings};

pub struct Harness {
    pub cache: Arc<MemoryCache>,
    pub transport: Arc<MemoryTransport>,
    pub store: SnapshotStore,
    pub publisher: BatchPublisher,
}

pub fn harness() -> Harness {
    let cache = Arc::new(MemoryCache::new());
    let transport = Arc::new(MemoryTransport::new());
    let store = SnapshotStore::new(cache.clone(), Ttls::default());
    let settings = PublisherSettings { stats_interval: None, ..PublisherSettings::default() };
    let (publisher, _) = BatchPublisher::spawn(transport.clone(), settings);
    Harness { cache, transport, store, publisher }
}

/// An upcoming EPL fixture with 1X2 odds.
pub fn fixture(id: &str) -> FixtureSnapshot {
    FixtureSnapshot::builder(id, "soccer_epl")
        .league("39", "Premier League")
        .teams("Arsenal", "Chelsea")
        .commence_time("2026-10-19T15:00:00Z")
        .odds(Some(Odds { home: 2.00, draw: Some(3.00), away: 3.50 }))
        .build()
}

pub fn live(mut f: FixtureSnapshot) -> FixtureSnapshot {
    f.status = FixtureStatus::Live;
    f
}

pub fn in_league(mut f: FixtureSnapshot, sport: &str, league_id: &str, league_name: &str) -> FixtureSnapshot {
    f.sport_key = sport.to_string();
    f.league_id = league_id.to_string();
    f.league_name = league_name.to_string();
    f
}

/// Every update carried by the messages published so far, in order.
pub fn published_updates(transport: &MemoryTransport) -> Vec<Value> {
    transport
        .messages()
        .iter()
        .flat_map(|m| {
            let v: Value = serde_json::from_str(&m.payload).unwrap();
            v["updates"].as_array().unwrap().clone()
        })
        .collect()
}
