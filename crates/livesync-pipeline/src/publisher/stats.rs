//! Publisher counters.

use std::time::Duration;

use livesync_core::latency::LatencyHistogram;

/// Running totals since the publisher started.
#[derive(Debug, Clone, Default)]
pub struct PublishStats {
    pub messages: u64,
    pub diffs: u64,
    pub bytes: u64,
    /// Running mean payload size of published messages.
    pub avg_message_bytes: f64,
    pub max_message_bytes: usize,
    /// Publishes the transport rejected. Their diffs are not retried.
    pub failed: u64,
    pub failed_diffs: u64,
    /// Messages carrying a single diff larger than the size margin.
    pub oversize: u64,
    pub latency: LatencyHistogram,
}

impl PublishStats {
    pub fn record_sent(&mut self, bytes: usize, diffs: usize, elapsed: Duration) {
        self.messages += 1;
        self.diffs += diffs as u64;
        self.bytes += bytes as u64;
        self.avg_message_bytes += (bytes as f64 - self.avg_message_bytes) / self.messages as f64;
        self.max_message_bytes = self.max_message_bytes.max(bytes);
        self.latency.record_duration(elapsed);
    }

    pub fn record_failed(&mut self, diffs: usize) {
        self.failed += 1;
        self.failed_diffs += diffs as u64;
    }
}

impl std::fmt::Display for PublishStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "messages={} diffs={} bytes={} avg={:.0}B max={}B failed={} ({} diffs) oversize={}",
            self.messages,
            self.diffs,
            self.bytes,
            self.avg_message_bytes,
            self.max_message_bytes,
            self.failed,
            self.failed_diffs,
            self.oversize,
        )?;
        if let Some(lat) = self.latency.stats() {
            write!(f, " publish[{lat}]")?;
        }
        Ok(())
    }
}
