//! Per-channel batching publisher.
//!
//! One actor task owns every channel queue and flush deadline; callers hold a
//! cloneable [`BatchPublisher`] handle and talk to it over an unbounded
//! `mpsc` channel, so enqueueing never blocks a pipeline worker.
//!
//! ```text
//! enqueue(diff) ──► queue[sports:<sport>] ──┬─ len == max_batch ──► flush now
//!                                           └─ window elapsed   ──► flush
//! flush: pack(queue, max_bytes) ──► Transport::publish (one call per message, in order)
//! ```
//!
//! A queue's window starts with its first diff and the queue is removed when
//! flushed. Publish failures are logged and counted; the diffs are not retried.

pub mod packing;
pub mod stats;

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use livesync_core::config::PublisherConfig;
use livesync_core::time_util;
use livesync_core::transport::{Transport, UPDATE_EVENT};
use livesync_core::Diff;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until, timeout};
use tracing::{debug, error, info, warn};

pub use packing::{PackedMessage, pack};
pub use stats::PublishStats;

// ---------------------------------------------------------------------------
// Settings / reports
// ---------------------------------------------------------------------------

/// Publisher tunables, resolved from [`PublisherConfig`].
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub max_batch: usize,
    pub flush_window: Duration,
    pub max_message_bytes: usize,
    pub stats_interval: Option<Duration>,
}

impl PublisherSettings {
    pub fn from_config(cfg: &PublisherConfig) -> Self {
        Self {
            max_batch: cfg.effective_max_batch(),
            flush_window: cfg.effective_flush_window(),
            max_message_bytes: cfg.effective_max_message_bytes(),
            stats_interval: cfg.effective_stats_interval(),
        }
    }
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self::from_config(&PublisherConfig::default())
    }
}

/// Outcome of the final flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub flushed_messages: usize,
    pub delivered_diffs: usize,
    /// Diffs still queued at the deadline or rejected by the transport.
    pub undelivered_diffs: usize,
    pub timed_out: bool,
}

impl std::fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "flushed {} message(s), delivered {} diff(s), undelivered {}{}",
            self.flushed_messages,
            self.delivered_diffs,
            self.undelivered_diffs,
            if self.timed_out { " (deadline hit)" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum Command {
    Enqueue(Diff),
    Flush(oneshot::Sender<()>),
    Stats(oneshot::Sender<PublishStats>),
    Shutdown { deadline: Duration, reply: oneshot::Sender<ShutdownReport> },
}

/// Cloneable handle to the publisher actor.
#[derive(Clone)]
pub struct BatchPublisher {
    tx: mpsc::UnboundedSender<Command>,
}

impl BatchPublisher {
    /// Spawn the actor on the current runtime.
    pub fn spawn(transport: Arc<dyn Transport>, settings: PublisherSettings) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = PublisherActor {
            transport,
            settings,
            queues: AHashMap::new(),
            stats: PublishStats::default(),
        };
        let handle = tokio::spawn(actor.run(rx));
        (Self { tx }, handle)
    }

    /// Queue a diff on its sport channel.
    pub fn enqueue(&self, diff: Diff) {
        if let Err(mpsc::error::SendError(Command::Enqueue(diff))) = self.tx.send(Command::Enqueue(diff)) {
            warn!("[publisher] stopped, dropping diff for {}", diff.fixture_id);
        }
    }

    /// Flush every queue now and wait until done.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Counter snapshot, or `None` once the actor has stopped.
    pub async fn stats(&self) -> Option<PublishStats> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(Command::Stats(tx)).ok()?;
        rx.await.ok()
    }

    /// Flush everything once, bounded by `deadline`, then stop the actor.
    ///
    /// Diffs enqueued after this call are dropped with a warning.
    pub async fn shutdown(&self, deadline: Duration) -> ShutdownReport {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { deadline, reply }).is_err() {
            return ShutdownReport::default();
        }
        rx.await.unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct ChannelQueue {
    diffs: Vec<Diff>,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct FlushProgress {
    messages: usize,
    delivered: usize,
    failed: usize,
}

struct PublisherActor {
    transport: Arc<dyn Transport>,
    settings: PublisherSettings,
    queues: AHashMap<String, ChannelQueue>,
    stats: PublishStats,
}

impl PublisherActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!(
            "[publisher] started (max_batch={}, window={:?}, max_bytes={})",
            self.settings.max_batch, self.settings.flush_window, self.settings.max_message_bytes
        );

        let mut stats_timer = self.settings.stats_interval.map(|period| {
            let mut t = interval_at(Instant::now() + period, period);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            t
        });

        loop {
            let next_deadline = self.queues.values().map(|q| q.deadline).min();
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Enqueue(diff)) => self.enqueue(diff).await,
                    Some(Command::Flush(done)) => {
                        self.flush_all(&mut FlushProgress::default()).await;
                        let _ = done.send(());
                    }
                    Some(Command::Stats(reply)) => {
                        let _ = reply.send(self.stats.clone());
                    }
                    Some(Command::Shutdown { deadline, reply }) => {
                        rx.close();
                        while let Ok(cmd) = rx.try_recv() {
                            if let Command::Enqueue(diff) = cmd {
                                self.push(diff);
                            }
                        }
                        let report = self.shutdown(deadline).await;
                        let _ = reply.send(report);
                        break;
                    }
                    None => {
                        self.flush_all(&mut FlushProgress::default()).await;
                        break;
                    }
                },
                _ = sleep_until_opt(next_deadline) => self.flush_due().await,
                _ = tick_opt(&mut stats_timer) => info!("[publisher] {}", self.stats),
            }
        }

        info!("[publisher] stopped: {}", self.stats);
    }

    /// Append to the channel queue, starting its window if it was empty.
    fn push(&mut self, diff: Diff) -> String {
        let channel = diff.channel();
        let window = self.settings.flush_window;
        self.queues
            .entry(channel.clone())
            .or_insert_with(|| ChannelQueue { diffs: Vec::new(), deadline: Instant::now() + window })
            .diffs
            .push(diff);
        channel
    }

    async fn enqueue(&mut self, diff: Diff) {
        let channel = self.push(diff);
        let full = self.queues.get(&channel).is_some_and(|q| q.diffs.len() >= self.settings.max_batch);
        if full {
            self.flush_channel(&channel, &mut FlushProgress::default()).await;
        }
    }

    async fn flush_due(&mut self) {
        let now = Instant::now();
        let due: Vec<String> =
            self.queues.iter().filter(|(_, q)| q.deadline <= now).map(|(ch, _)| ch.clone()).collect();
        for channel in due {
            self.flush_channel(&channel, &mut FlushProgress::default()).await;
        }
    }

    async fn flush_all(&mut self, progress: &mut FlushProgress) {
        let channels: Vec<String> = self.queues.keys().cloned().collect();
        for channel in channels {
            self.flush_channel(&channel, progress).await;
        }
    }

    async fn flush_channel(&mut self, channel: &str, progress: &mut FlushProgress) {
        let Some(queue) = self.queues.remove(channel) else {
            return;
        };

        let max = self.settings.max_message_bytes;
        let packed = match pack(&queue.diffs, max, time_util::now_ms()) {
            Ok(p) => p,
            Err(e) => {
                error!("[publisher] {channel}: failed to encode {} diffs: {e}", queue.diffs.len());
                self.stats.record_failed(queue.diffs.len());
                progress.failed += queue.diffs.len();
                return;
            }
        };
        debug!("[publisher] {channel}: {} diffs -> {} message(s)", queue.diffs.len(), packed.len());

        for msg in packed {
            if msg.oversize {
                warn!(
                    "[publisher] {channel}: single diff of {} bytes exceeds the {max}-byte margin, sending alone",
                    msg.payload.len()
                );
                self.stats.oversize += 1;
            }
            let started = Instant::now();
            match self.transport.publish(channel, UPDATE_EVENT, &msg.payload).await {
                Ok(()) => {
                    self.stats.record_sent(msg.payload.len(), msg.count, started.elapsed());
                    progress.messages += 1;
                    progress.delivered += msg.count;
                }
                Err(e) => {
                    error!("[publisher] {channel}: publish of {} diffs failed: {e}", msg.count);
                    self.stats.record_failed(msg.count);
                    progress.failed += msg.count;
                }
            }
        }
    }

    async fn shutdown(&mut self, deadline: Duration) -> ShutdownReport {
        let pending: usize = self.queues.values().map(|q| q.diffs.len()).sum();
        info!("[publisher] final flush of {pending} diff(s) across {} channel(s)", self.queues.len());

        let mut progress = FlushProgress::default();
        let timed_out = timeout(deadline, self.flush_all(&mut progress)).await.is_err();

        ShutdownReport {
            flushed_messages: progress.messages,
            delivered_diffs: progress.delivered,
            undelivered_diffs: pending.saturating_sub(progress.delivered),
            timed_out,
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => sleep_until(d).await,
        None => pending().await,
    }
}

async fn tick_opt(timer: &mut Option<Interval>) {
    match timer {
        Some(t) => {
            t.tick().await;
        }
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use livesync_core::error::SyncResult;
    use livesync_core::transport::MemoryTransport;
    use livesync_core::{Change, Diff};
    use serde_json::{Value, json};

    fn diff(id: &str, sport: &str) -> Diff {
        Diff::new(id, sport, vec![Change::new("status", json!("live"), Some(json!("upcoming")))], 1).unwrap()
    }

    fn settings(max_batch: usize) -> PublisherSettings {
        PublisherSettings {
            max_batch,
            flush_window: Duration::from_millis(300),
            max_message_bytes: 60_000,
            stats_interval: None,
        }
    }

    fn spawn(max_batch: usize) -> (Arc<MemoryTransport>, BatchPublisher) {
        let transport = Arc::new(MemoryTransport::new());
        let (publisher, _) = BatchPublisher::spawn(transport.clone(), settings(max_batch));
        (transport, publisher)
    }

    fn update_ids(payload: &str) -> Vec<String> {
        let v: Value = serde_json::from_str(payload).unwrap();
        v["updates"].as_array().unwrap().iter().map(|u| u["fixture_id"].as_str().unwrap().to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn window_flushes_after_first_enqueue() {
        let (transport, publisher) = spawn(50);
        for id in ["a", "b", "c"] {
            publisher.enqueue(diff(id, "soccer_epl"));
        }

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(transport.count(), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        let sent = transport.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, "sports:soccer_epl");
        assert_eq!(sent[0].event, "update");
        assert_eq!(update_ids(&sent[0].payload), ["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_batch_flushes_immediately() {
        let (transport, publisher) = spawn(2);
        for id in ["a", "b", "c", "d", "e"] {
            publisher.enqueue(diff(id, "soccer_epl"));
        }
        // Round-trip through the actor so every enqueue has been handled.
        let stats = publisher.stats().await.unwrap();
        assert_eq!(stats.messages, 2);
        assert_eq!(transport.count(), 2);

        tokio::time::sleep(Duration::from_millis(301)).await;
        let sent = transport.messages();
        assert_eq!(sent.len(), 3);
        assert_eq!(update_ids(&sent[2].payload), ["e"]);
    }

    #[tokio::test(start_paused = true)]
    async fn channels_batch_independently() {
        let (transport, publisher) = spawn(50);
        publisher.enqueue(diff("a", "soccer_epl"));
        publisher.enqueue(diff("t", "tennis_atp"));
        publisher.enqueue(diff("b", "soccer_epl"));
        publisher.flush().await;

        let mut sent = transport.messages();
        sent.sort_by(|x, y| x.channel.cmp(&y.channel));
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].channel, "sports:soccer_epl");
        assert_eq!(update_ids(&sent[0].payload), ["a", "b"]);
        assert_eq!(update_ids(&sent[1].payload), ["t"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_publish_is_counted_not_retried() {
        let (transport, publisher) = spawn(50);
        transport.set_failing(true);
        publisher.enqueue(diff("a", "soccer_epl"));
        publisher.flush().await;

        transport.set_failing(false);
        publisher.enqueue(diff("b", "soccer_epl"));
        publisher.flush().await;

        let stats = publisher.stats().await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.failed_diffs, 1);
        assert_eq!(stats.messages, 1);
        assert_eq!(update_ids(&transport.messages()[0].payload), ["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_and_reports() {
        let (transport, publisher) = spawn(50);
        publisher.enqueue(diff("a", "soccer_epl"));
        publisher.enqueue(diff("b", "soccer_epl"));
        publisher.enqueue(diff("t", "tennis_atp"));

        let report = publisher.shutdown(Duration::from_secs(1)).await;
        assert_eq!(
            report,
            ShutdownReport { flushed_messages: 2, delivered_diffs: 3, undelivered_diffs: 0, timed_out: false }
        );
        assert_eq!(transport.count(), 2);

        // The actor is gone; late diffs are dropped, not panicked on.
        publisher.enqueue(diff("late", "soccer_epl"));
        assert!(publisher.stats().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_final_flush_is_undelivered() {
        let (transport, publisher) = spawn(50);
        transport.set_failing(true);
        publisher.enqueue(diff("a", "soccer_epl"));
        publisher.enqueue(diff("b", "soccer_epl"));

        let report = publisher.shutdown(Duration::from_secs(1)).await;
        assert_eq!(report.flushed_messages, 0);
        assert_eq!(report.undelivered_diffs, 2);
        assert!(!report.timed_out);
    }

    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn publish(&self, _channel: &str, _event: &str, _payload: &str) -> SyncResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_deadline_bounds_the_final_flush() {
        let (publisher, handle) = BatchPublisher::spawn(Arc::new(StalledTransport), settings(50));
        publisher.enqueue(diff("a", "soccer_epl"));
        publisher.enqueue(diff("t", "tennis_atp"));

        let report = publisher.shutdown(Duration::from_secs(5)).await;
        assert!(report.timed_out);
        assert_eq!(report.flushed_messages, 0);
        assert_eq!(report.undelivered_diffs, 2);
        handle.await.unwrap();
    }
}
