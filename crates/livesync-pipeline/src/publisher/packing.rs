//! Greedy, size-bounded packing of diffs into batch messages.
//!
//! Every message has the shape
//!
//! ```text
//! {"type":"batch:updates","updates":[<diff>,...],"count":N,"timestamp":<ms>}
//! ```
//!
//! Diffs are serialized once into [`RawValue`]s; the packer then only adds up
//! lengths, so each message is rendered exactly once. Order is preserved: the
//! concatenation of every message's `updates` equals the input.

use livesync_core::Diff;
use serde::Serialize;
use serde_json::value::{RawValue, to_raw_value};

/// `type` tag of a batch message.
pub const BATCH_MESSAGE_TYPE: &str = "batch:updates";

#[derive(Serialize)]
struct BatchEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    updates: &'a [&'a RawValue],
    count: usize,
    timestamp: u64,
}

/// One rendered batch message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedMessage {
    pub payload: String,
    /// Number of diffs carried.
    pub count: usize,
    /// A single diff that alone exceeds the byte bound.
    pub oversize: bool,
}

/// Bytes a message with `count` updates needs beyond the updates themselves
/// (envelope plus the separating commas).
fn overhead(count: usize, timestamp: u64) -> serde_json::Result<usize> {
    let empty = BatchEnvelope { kind: BATCH_MESSAGE_TYPE, updates: &[], count, timestamp };
    Ok(serde_json::to_string(&empty)?.len() + count.saturating_sub(1))
}

fn render(updates: &[&RawValue], timestamp: u64, max_bytes: usize) -> serde_json::Result<PackedMessage> {
    let payload = serde_json::to_string(&BatchEnvelope {
        kind: BATCH_MESSAGE_TYPE,
        updates,
        count: updates.len(),
        timestamp,
    })?;
    let oversize = payload.len() > max_bytes;
    Ok(PackedMessage { payload, count: updates.len(), oversize })
}

/// Pack `diffs` into as few messages as fit under `max_bytes` each.
///
/// A diff is added to the current message unless that would push it past the
/// bound, in which case the message is closed and a new one started. A diff
/// that does not fit even alone is emitted as its own message flagged
/// [`PackedMessage::oversize`].
pub fn pack(diffs: &[Diff], max_bytes: usize, timestamp: u64) -> serde_json::Result<Vec<PackedMessage>> {
    let raws = diffs.iter().map(to_raw_value).collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::new();
    let mut current: Vec<&RawValue> = Vec::new();
    let mut updates_len = 0usize;

    for raw in &raws {
        let len = raw.get().len();
        if !current.is_empty() && overhead(current.len() + 1, timestamp)? + updates_len + len > max_bytes {
            out.push(render(&current, timestamp, max_bytes)?);
            current.clear();
            updates_len = 0;
        }
        current.push(&**raw);
        updates_len += len;
    }
    if !current.is_empty() {
        out.push(render(&current, timestamp, max_bytes)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesync_core::Change;
    use serde_json::{Value, json};

    fn diff(id: usize, pad: usize) -> Diff {
        let change = Change::new("odds", json!({"home": 1.5, "note": "x".repeat(pad)}), None);
        Diff::new(format!("m{id}"), "soccer_epl", vec![change], 1_700_000_000_000).unwrap()
    }

    fn updates_of(msg: &PackedMessage) -> Vec<Value> {
        let v: Value = serde_json::from_str(&msg.payload).unwrap();
        assert_eq!(v["type"], BATCH_MESSAGE_TYPE);
        assert_eq!(v["count"], msg.count);
        v["updates"].as_array().unwrap().clone()
    }

    #[test]
    fn everything_fits_in_one_message() {
        let diffs: Vec<_> = (0..5).map(|i| diff(i, 10)).collect();
        let packed = pack(&diffs, 60_000, 7).unwrap();
        assert_eq!(packed.len(), 1);
        assert_eq!(packed[0].count, 5);
        assert!(!packed[0].oversize);
    }

    #[test]
    fn splits_preserve_order_and_bound() {
        let diffs: Vec<_> = (0..40).map(|i| diff(i, 50 + i * 7)).collect();
        let max = 1_000;
        let packed = pack(&diffs, max, 7).unwrap();

        assert!(packed.len() > 1);
        let mut seen = Vec::new();
        for msg in &packed {
            assert!(msg.payload.len() <= max, "{} > {max}", msg.payload.len());
            seen.extend(updates_of(msg));
        }
        let expected: Vec<Value> = diffs.iter().map(|d| serde_json::to_value(d).unwrap()).collect();
        assert_eq!(seen, expected);

        // Never fewer messages than the raw bytes demand.
        let total: usize = diffs.iter().map(|d| serde_json::to_string(d).unwrap().len()).sum();
        assert!(packed.len() >= total.div_ceil(max));
    }

    #[test]
    fn oversize_diff_travels_alone() {
        let diffs = vec![diff(0, 10), diff(1, 5_000), diff(2, 10)];
        let packed = pack(&diffs, 1_000, 7).unwrap();
        assert_eq!(packed.len(), 3);
        assert!(!packed[0].oversize);
        assert!(packed[1].oversize);
        assert_eq!(packed[1].count, 1);
        assert!(!packed[2].oversize);
    }

    #[test]
    fn nothing_in_nothing_out() {
        assert!(pack(&[], 1_000, 7).unwrap().is_empty());
    }
}
