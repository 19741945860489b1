//! Periodic task scheduler.
//!
//! Each [`SyncTask`] gets its own loop driven by a `tokio::time::interval`
//! (first tick immediate). Every tick spawns the cycle as a separate task, so
//! a slow cycle never delays the next tick and cycles of one task may overlap.
//! Errors and panics are logged and never stop the loop.
//!
//! Cycles are never cancelled. A fixture's snapshot write and its diff enqueue
//! must both happen, so a cycle that overruns its budget is reported and left
//! to finish, and [`Scheduler::stop`] waits for in-flight cycles before
//! returning.
//!
//! ```text
//! Scheduler::start ──► per task: interval ──tick──► spawn(run_cycle, warn on overrun)
//!                                   ▲                    │
//! Scheduler::stop ──watch──► drain  └──── join_next ◄────┘ (log summary)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use livesync_core::store::SnapshotStore;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::pipeline::CycleSummary;

/// A periodically executed unit of work.
#[async_trait]
pub trait SyncTask: Send + Sync {
    /// Short name used as the log tag.
    fn name(&self) -> &str;

    fn period(&self) -> Duration;

    /// Run one full cycle.
    async fn run_cycle(&self) -> Result<CycleSummary>;
}

// ---------------------------------------------------------------------------
// Readiness gate
// ---------------------------------------------------------------------------

/// Poll the store until it answers, up to `attempts` times `interval` apart.
///
/// Returns `false` if it never became ready; callers log and continue.
pub async fn wait_until_ready(store: &SnapshotStore, attempts: u32, interval: Duration) -> bool {
    for attempt in 1..=attempts {
        if store.is_ready().await {
            info!("[scheduler] cache ready after {attempt} attempt(s)");
            return true;
        }
        debug!("[scheduler] cache not ready (attempt {attempt}/{attempts})");
        if attempt < attempts {
            sleep(interval).await;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct Registered {
    task: Arc<dyn SyncTask>,
    cycle_timeout: Duration,
}

/// Runs every registered task on its own period until stopped.
pub struct Scheduler {
    tasks: Vec<Registered>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { tasks: Vec::new(), shutdown_tx, handles: Vec::new() }
    }

    /// Register a task; a cycle running past `cycle_timeout` is reported.
    pub fn add(&mut self, task: Arc<dyn SyncTask>, cycle_timeout: Duration) {
        self.tasks.push(Registered { task, cycle_timeout });
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|r| r.task.name()).collect()
    }

    /// Spawn one loop per registered task.
    pub fn start(&mut self) {
        for reg in &self.tasks {
            info!(
                "[scheduler] starting '{}' every {:?} (cycle budget {:?})",
                reg.task.name(),
                reg.task.period(),
                reg.cycle_timeout
            );
            let handle = tokio::spawn(run_task_loop(reg.task.clone(), reg.cycle_timeout, self.shutdown_tx.subscribe()));
            self.handles.push(handle);
        }
    }

    /// Stop ticking and wait for every loop to exit, including the cycles
    /// still in flight.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("[scheduler] task loop ended abnormally: {e}");
            }
        }
        info!("[scheduler] stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

struct CycleResult {
    result: Result<CycleSummary>,
    elapsed: Duration,
    overran: bool,
}

/// Run one cycle to completion, warning once if it exceeds `budget`.
async fn run_reported(task: Arc<dyn SyncTask>, budget: Duration) -> CycleResult {
    let started = Instant::now();
    let cycle = task.run_cycle();
    tokio::pin!(cycle);
    let (result, overran) = match timeout(budget, &mut cycle).await {
        Ok(result) => (result, false),
        Err(_) => {
            warn!("[{}] cycle still running after {budget:?}, letting it finish", task.name());
            (cycle.await, true)
        }
    };
    CycleResult { result, elapsed: started.elapsed(), overran }
}

async fn run_task_loop(task: Arc<dyn SyncTask>, cycle_timeout: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let name = task.name().to_string();
    let mut ticker = interval(task.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight: JoinSet<CycleResult> = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {
                if !in_flight.is_empty() {
                    debug!("[{name}] {} cycle(s) still running, starting another", in_flight.len());
                }
                in_flight.spawn(run_reported(task.clone(), cycle_timeout));
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                log_cycle(&name, joined);
            }
        }
    }

    if !in_flight.is_empty() {
        info!("[{name}] waiting for {} in-flight cycle(s)", in_flight.len());
    }
    while let Some(joined) = in_flight.join_next().await {
        log_cycle(&name, joined);
    }
    info!("[{name}] loop exited");
}

fn log_cycle(name: &str, joined: std::result::Result<CycleResult, JoinError>) {
    let CycleResult { result, elapsed, overran } = match joined {
        Ok(done) => done,
        Err(e) => {
            if e.is_panic() {
                error!("[{name}] cycle panicked: {e}");
            }
            return;
        }
    };
    match result {
        Ok(summary) if summary.failed > 0 || overran => {
            warn!("[{name}] cycle finished in {elapsed:?} with failures or overrun: {summary}");
        }
        Ok(summary) => info!("[{name}] cycle finished in {elapsed:?}: {summary}"),
        Err(e) => error!("[{name}] cycle failed after {elapsed:?}: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use livesync_core::cache::MemoryCache;
    use livesync_core::keys::Ttls;

    struct CountingTask {
        name: &'static str,
        period: Duration,
        work: Duration,
        fail: bool,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl CountingTask {
        fn new(period_s: u64, work_s: u64) -> Arc<Self> {
            Self::named("counter", period_s, work_s, false)
        }

        fn named(name: &'static str, period_s: u64, work_s: u64, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                period: Duration::from_secs(period_s),
                work: Duration::from_secs(work_s),
                fail,
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            })
        }

        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }

        fn finished(&self) -> usize {
            self.finished.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SyncTask for CountingTask {
        fn name(&self) -> &str {
            self.name
        }

        fn period(&self) -> Duration {
            self.period
        }

        async fn run_cycle(&self) -> Result<CycleSummary> {
            self.started.fetch_add(1, Ordering::SeqCst);
            sleep(self.work).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail { Err(anyhow!("source down")) } else { Ok(CycleSummary::default()) }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_immediately_then_every_period() {
        let counter = CountingTask::new(10, 0);
        let mut scheduler = Scheduler::new();
        scheduler.add(counter.clone(), Duration::from_secs(10));
        scheduler.start();

        sleep(Duration::from_secs(35)).await;
        assert_eq!(counter.started(), 4); // t = 0, 10, 20, 30

        scheduler.stop().await;
        sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.started(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycles_do_not_delay_ticks() {
        let counter = CountingTask::new(10, 25);
        let mut scheduler = Scheduler::new();
        scheduler.add(counter.clone(), Duration::from_secs(100));
        scheduler.start();

        sleep(Duration::from_secs(21)).await;
        assert_eq!(counter.started(), 3);
        assert_eq!(counter.finished(), 0);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.finished(), 1);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_cycles_run_to_completion() {
        let counter = CountingTask::new(10, 30);
        let mut scheduler = Scheduler::new();
        scheduler.add(counter.clone(), Duration::from_secs(5));
        scheduler.start();

        sleep(Duration::from_secs(45)).await;
        assert_eq!(counter.started(), 5); // t = 0, 10, 20, 30, 40
        assert_eq!(counter.finished(), 2); // t = 30, 40

        let stop_at = Instant::now();
        scheduler.stop().await;
        assert_eq!(counter.finished(), 5);
        assert_eq!(stop_at.elapsed(), Duration::from_secs(25)); // last cycle ends at t = 70
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_and_failing_tasks_do_not_delay_others() {
        let steady = CountingTask::named("steady", 10, 0, false);
        let stalled = CountingTask::named("stalled", 10, 100, false);
        let failing = CountingTask::named("failing", 5, 0, true);
        let mut scheduler = Scheduler::new();
        scheduler.add(steady.clone(), Duration::from_secs(10));
        scheduler.add(stalled.clone(), Duration::from_secs(10));
        scheduler.add(failing.clone(), Duration::from_secs(5));
        scheduler.start();

        sleep(Duration::from_secs(33)).await;
        assert_eq!(steady.started(), 4);
        assert_eq!(steady.finished(), 4);
        assert_eq!(stalled.finished(), 0);
        assert_eq!(failing.finished(), 7); // t = 0, 5, .., 30

        scheduler.stop().await;
        assert_eq!(stalled.finished(), stalled.started());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_cycles_keep_the_loop_alive() {
        let counter = CountingTask::named("counter", 1, 0, true);
        let mut scheduler = Scheduler::new();
        scheduler.add(counter.clone(), Duration::from_secs(1));
        scheduler.start();

        sleep(Duration::from_millis(4_500)).await;
        assert_eq!(counter.finished(), 5);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_gate_waits_for_the_cache() {
        let cache = Arc::new(MemoryCache::new());
        cache.set_ready(false);
        let store = SnapshotStore::new(cache.clone(), Ttls::default());

        let flip = cache.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(5)).await;
            flip.set_ready(true);
        });
        assert!(wait_until_ready(&store, 30, Duration::from_secs(2)).await);

        cache.set_ready(false);
        let started = Instant::now();
        assert!(!wait_until_ready(&store, 3, Duration::from_secs(2)).await);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }
}
