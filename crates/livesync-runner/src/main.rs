//! # livesync-runner
//!
//! Main entry point for the live-fixture sync service.
//!
//! Loads a JSON configuration file, wires the cache, transport and upstream
//! sources, waits for the cache to come up, and runs the live, prematch,
//! manual and catalog tasks until Ctrl+C. On shutdown the publisher gets one
//! bounded final flush.
//!
//! # Usage
//!
//! ```bash
//! livesync-runner config.json --log-level info
//! livesync-runner config.json --memory          # in-process cache + transport
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use livesync_core::cache::{Cache, MemoryCache, RedisCache};
use livesync_core::config::AppConfig;
use livesync_core::keys::Ttls;
use livesync_core::logging::{LogOptions, init_logging};
use livesync_core::store::SnapshotStore;
use livesync_core::transport::{MemoryTransport, RedisTransport, Transport};
use livesync_pipeline::markets::BookmakerMarkets;
use livesync_pipeline::pipeline::SyncPipeline;
use livesync_pipeline::projector::LegacyProjector;
use livesync_pipeline::publisher::{BatchPublisher, PublisherSettings};
use livesync_pipeline::scheduler::{Scheduler, SyncTask, wait_until_ready};
use livesync_pipeline::sources::{HttpFixtureFeed, HttpManualStore, ManualAdapter};
use livesync_pipeline::tasks::{CatalogTask, FeedTask, ManualTask};
use tracing::{error, info, warn};

/// Live fixture sync runner.
#[derive(Parser)]
#[command(name = "livesync-runner", about = "Live fixture diff-and-publish sync service")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output (overrides `service.log_path`).
    #[arg(long)]
    log_dir: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,

    /// Use the in-process cache and transport instead of Redis.
    #[arg(long)]
    memory: bool,
}

fn build_backends(config: &AppConfig, in_memory: bool) -> Result<(Arc<dyn Cache>, Arc<dyn Transport>)> {
    if in_memory {
        warn!("running with in-memory cache and transport; nothing leaves this process");
        return Ok((Arc::new(MemoryCache::new()), Arc::new(MemoryTransport::new())));
    }
    // validate() has already rejected missing URLs.
    let cache_url = config.cache.url.as_deref().unwrap_or_default();
    let transport_url = config.transport.url.as_deref().unwrap_or_default();
    let cache = RedisCache::new(cache_url).context("cache backend")?;
    let transport = RedisTransport::new(transport_url).context("transport backend")?;
    Ok((Arc::new(cache), Arc::new(transport)))
}

fn build_tasks(
    config: &AppConfig,
    store: &SnapshotStore,
    pipeline: &Arc<SyncPipeline>,
    projector: &Arc<LegacyProjector>,
) -> Result<Vec<Arc<dyn SyncTask>>> {
    let sched = &config.schedule;
    let mut tasks: Vec<Arc<dyn SyncTask>> = Vec::new();

    if let Some(url) = &config.sources.feed_url {
        let feed = Arc::new(HttpFixtureFeed::new(url, &config.sources).context("unified reader client")?);
        tasks.push(Arc::new(FeedTask::live(
            feed.clone(),
            pipeline.clone(),
            projector.clone(),
            sched.effective_live_interval(),
        )));
        tasks.push(Arc::new(FeedTask::prematch(
            feed.clone(),
            pipeline.clone(),
            projector.clone(),
            sched.effective_prematch_interval(),
            config.sources.effective_upcoming_limit(),
        )));
        tasks.push(Arc::new(CatalogTask::new(feed, store.clone(), sched.effective_catalog_interval())));
    }

    if let Some(url) = &config.sources.manual_url {
        let manual = Arc::new(HttpManualStore::new(url, &config.sources).context("manual store client")?);
        tasks.push(Arc::new(ManualTask::new(
            ManualAdapter::new(manual).with_concurrency(sched.effective_concurrency()),
            pipeline.clone(),
            projector.clone(),
            sched.effective_manual_interval(),
        )));
    }

    Ok(tasks)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration, then logging (log_path lives in the config)
    let config = livesync_core::config::load_config(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    let service = config.service_name();
    init_logging(&LogOptions {
        level: &cli.log_level,
        dir: log_dir.as_deref(),
        file_prefix: &service,
        json: cli.log_json,
    });

    info!("{service} starting — config={}, log_level={}", cli.config.display(), cli.log_level);

    if let Err(e) = config.validate(cli.memory) {
        error!("invalid configuration: {e}");
        return Err(e.into());
    }

    // 2. Backends
    let (cache, transport) = build_backends(&config, cli.memory)?;
    let store = SnapshotStore::new(cache, Ttls::from_config(&config.store));

    // 3. Readiness gate
    let ready = wait_until_ready(
        &store,
        config.cache.effective_ready_attempts(),
        config.cache.effective_ready_interval(),
    )
    .await;
    if !ready {
        warn!("cache did not report ready; starting anyway, cycles will fail until it does");
    }

    // 4. Engine
    let (publisher, publisher_task) =
        BatchPublisher::spawn(transport, PublisherSettings::from_config(&config.publisher));
    let pipeline = Arc::new(
        SyncPipeline::new(
            store.clone(),
            publisher.clone(),
            Arc::new(BookmakerMarkets),
            config.schedule.effective_concurrency(),
        )
        .with_ttl_refresh(config.store.effective_refresh_ttl_on_unchanged()),
    );
    let projector = Arc::new(LegacyProjector::new(store.clone()));

    // 5. Tasks
    let mut scheduler = Scheduler::new();
    for task in build_tasks(&config, &store, &pipeline, &projector)? {
        let cycle_timeout = config.schedule.effective_cycle_timeout(task.period());
        scheduler.add(task, cycle_timeout);
    }
    scheduler.start();
    info!("running tasks {:?} — press Ctrl+C to stop", scheduler.task_names());

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 7. Stop ticking, then one bounded flush
    scheduler.stop().await;
    let report = publisher.shutdown(config.publisher.effective_shutdown_deadline()).await;
    if report.undelivered_diffs > 0 {
        error!("publisher shutdown: {report}");
    } else {
        info!("publisher shutdown: {report}");
    }
    if let Err(e) = publisher_task.await {
        error!("publisher task ended abnormally: {e}");
    }

    info!("{service} stopped — goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_parse() {
        let cli = Cli::try_parse_from(["livesync-runner", "cfg.json", "--log-level", "debug", "--memory", "--log-json"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("cfg.json"));
        assert_eq!(cli.log_level, "debug");
        assert!(cli.memory);
        assert!(cli.log_json);
        assert!(cli.log_dir.is_none());
    }

    #[tokio::test]
    async fn tasks_follow_configured_sources() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "sources": { "feed_url": "http://reader:8080", "manual_url": "http://admin:8080" } }"#,
        )
        .unwrap();
        let store = SnapshotStore::new(Arc::new(MemoryCache::new()), Ttls::default());
        let (publisher, _) = BatchPublisher::spawn(Arc::new(MemoryTransport::new()), PublisherSettings::default());
        let pipeline = Arc::new(SyncPipeline::new(store.clone(), publisher, Arc::new(BookmakerMarkets), 6));
        let projector = Arc::new(LegacyProjector::new(store.clone()));

        let tasks = build_tasks(&config, &store, &pipeline, &projector).unwrap();
        let names: Vec<&str> = tasks.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["live", "prematch", "catalog", "manual"]);
    }
}
