//! Logging initialization using the `tracing` ecosystem.
//!
//! Provides:
//! - Console output (colored, human-readable, or JSON lines)
//! - File output (daily rotation via `tracing-appender`)
//! - Configurable log level via env var `RUST_LOG` or explicit parameter

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging options, usually filled from the CLI.
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Default level if `RUST_LOG` is not set (e.g. `"info"`).
    pub level: &'a str,
    /// Optional directory for daily-rotating log files.
    pub dir: Option<&'a str>,
    /// Log file prefix (e.g. `"livesync"`).
    pub file_prefix: &'a str,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

/// Initialize the global tracing subscriber.
///
/// Should be called once at program start. After this, all `tracing::info!()`
/// etc. macros will produce output.
pub fn init_logging(opts: &LogOptions<'_>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(opts.level));

    let console_layer = if opts.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let file_layer = opts.dir.map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, opts.file_prefix);
        if opts.json {
            fmt::layer().json().with_writer(file_appender).with_target(true).boxed()
        } else {
            fmt::layer().with_writer(file_appender).with_ansi(false).with_target(true).boxed()
        }
    });

    tracing_subscriber::registry().with(env_filter).with(console_layer).with(file_layer).init();
}
