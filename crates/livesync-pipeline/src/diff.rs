//! Minimal diff between a fixture's stored snapshot and its fresh state.
//!
//! Only the fields clients render as live state are compared, in a fixed
//! order: `status`, `market_status`, `scores.home`, `scores.away`, `odds`,
//! `commence_time`. Team names, league metadata and bookmaker blocks are
//! treated as immutable for a fixture id and never produce a change.
//!
//! Odds use the [`ODDS_TOLERANCE`](livesync_core::ODDS_TOLERANCE) band so
//! rounding jitter in upstream quotes does not generate traffic; every other
//! field is compared exactly.

use livesync_core::time_util;
use livesync_core::{Change, Diff, FixtureSnapshot, NEW_FIXTURE_PATH};
use serde::Serialize;
use serde_json::Value;

/// Diff `curr` against `prev`, stamped with the current wall clock.
///
/// Returns `None` when nothing tracked changed. A missing `prev` always yields
/// one `new` change carrying the whole snapshot.
pub fn diff(prev: Option<&FixtureSnapshot>, curr: &FixtureSnapshot) -> Option<Diff> {
    diff_at(prev, curr, time_util::now_ms())
}

/// [`diff`] with an explicit timestamp (epoch ms).
pub fn diff_at(prev: Option<&FixtureSnapshot>, curr: &FixtureSnapshot, timestamp: u64) -> Option<Diff> {
    let Some(prev) = prev else {
        let change = Change::new(NEW_FIXTURE_PATH, to_json(curr), None);
        return Diff::new(&curr.id, &curr.sport_key, vec![change], timestamp);
    };

    let mut changes = Vec::new();

    if prev.status != curr.status {
        changes.push(Change::new("status", to_json(&curr.status), Some(to_json(&prev.status))));
    }

    if prev.market_status != curr.market_status {
        changes.push(Change::new(
            "market_status",
            to_json(&curr.market_status),
            Some(to_json(&prev.market_status)),
        ));
    }

    if let Some(scores) = curr.scores {
        let old_home = prev.scores.map(|s| s.home);
        if old_home != Some(scores.home) {
            changes.push(Change::new("scores.home", Value::from(scores.home), old_home.map(Value::from)));
        }
        let old_away = prev.scores.map(|s| s.away);
        if old_away != Some(scores.away) {
            changes.push(Change::new("scores.away", Value::from(scores.away), old_away.map(Value::from)));
        }
    }

    if let Some(odds) = curr.odds {
        let moved = prev.odds.is_none_or(|old| odds.differs_from(&old));
        if moved {
            changes.push(Change::new("odds", to_json(&odds), prev.odds.as_ref().map(to_json)));
        }
    }

    if prev.commence_time != curr.commence_time {
        changes.push(Change::new(
            "commence_time",
            Value::from(curr.commence_time.clone()),
            Some(Value::from(prev.commence_time.clone())),
        ));
    }

    Diff::new(&curr.id, &curr.sport_key, changes, timestamp)
}

/// Serialize a field value. These types contain nothing that can fail to
/// encode; a non-finite float degrades to `null` inside serde_json itself.
fn to_json<T: Serialize + ?Sized>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}
