//! # livesync-core
//!
//! Core crate for the live-fixture synchronization system, providing:
//!
//! - **Types** (`types`) — fixture snapshots, diffs, league summaries, sports
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `SyncError` via thiserror
//! - **Cache** (`cache`) — async key-value cache trait with Redis and in-memory backends
//! - **Keys** (`keys`) — persisted key patterns and TTLs shared with readers
//! - **Store** (`store`) — typed snapshot/index/catalog accessors over a cache
//! - **Transport** (`transport`) — per-sport pub/sub publishing
//! - **Latency** (`latency`) — histogram-based latency statistics
//! - **Time utilities** (`time_util`) — epoch timestamps
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod latency;
pub mod logging;
pub mod store;
pub mod time_util;
pub mod transport;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
