//! # livesync-pipeline
//!
//! The fetch → diff → persist → publish engine.
//!
//! ## Architecture
//!
//! ```text
//! FixtureSource / ManualAdapter ──► SyncPipeline ──► SnapshotStore (fixture + index + markets)
//!                                        │
//!                                        └──► BatchPublisher ──► Transport (sports:<sport>)
//!                       LegacyProjector ──► SnapshotStore (league lists, match arrays, catalog)
//! ```
//!
//! Each [`scheduler::SyncTask`] drives one slice (live, prematch, manual,
//! catalog refresh) on its own period; the [`scheduler::Scheduler`] runs them
//! independently so a slow or failing source never holds up the others.
//!
//! ## Modules
//!
//! - [`diff`] — minimal field-level diff between two snapshots
//! - [`json_util`] — lenient string-or-number JSON helpers
//! - [`sources`] — collaborator traits, HTTP clients, manual-row translation
//! - [`markets`] — derived market generation seam
//! - [`pipeline`] — bounded per-fixture processing
//! - [`projector`] — legacy per-sport views and the master league catalog
//! - [`publisher`] — per-channel batching actor with size-bounded packing
//! - [`scheduler`] — task trait, per-task loops, readiness gate
//! - [`tasks`] — live, prematch, manual and catalog-refresh tasks

pub mod diff;
pub mod json_util;
pub mod markets;
pub mod pipeline;
pub mod projector;
pub mod publisher;
pub mod scheduler;
pub mod sources;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support;
