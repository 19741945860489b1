//! Field-level change sets published to clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Path of the synthetic change emitted when a fixture is seen for the first time.
pub const NEW_FIXTURE_PATH: &str = "new";

/// One changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub value: Value,
    #[serde(rename = "oldValue", default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
}

impl Change {
    pub fn new(path: impl Into<String>, value: Value, old_value: Option<Value>) -> Self {
        Self { path: path.into(), value, old_value }
    }
}

/// The minimal set of changes for one fixture between two snapshots.
///
/// Never constructed with an empty `changes` list: [`Diff::new`] returns
/// `None` in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub fixture_id: String,
    pub sport_key: String,
    pub changes: Vec<Change>,
    /// Epoch milliseconds.
    pub timestamp: u64,
}

impl Diff {
    pub fn new(
        fixture_id: impl Into<String>,
        sport_key: impl Into<String>,
        changes: Vec<Change>,
        timestamp: u64,
    ) -> Option<Self> {
        if changes.is_empty() {
            return None;
        }
        Some(Self {
            fixture_id: fixture_id.into(),
            sport_key: sport_key.into(),
            changes,
            timestamp,
        })
    }

    /// `true` if this diff introduces a fixture rather than updating one.
    pub fn is_new(&self) -> bool {
        self.changes.len() == 1 && self.changes[0].path == NEW_FIXTURE_PATH
    }

    pub fn channel(&self) -> String {
        super::sport_channel(&self.sport_key)
    }
}
