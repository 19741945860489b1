//! Core data types: fixture snapshots, diffs, and league/sport summaries.
//!
//! Every struct here round-trips through JSON because the cache and the
//! pub/sub transport both carry JSON text. Field names are the wire names
//! that downstream readers depend on.

pub mod diff;
pub mod fixture;
pub mod league;

pub use diff::*;
pub use fixture::*;
pub use league::*;
