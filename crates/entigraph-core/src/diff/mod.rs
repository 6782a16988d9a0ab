//! Branch merging and snapshot comparison.
//!
//! ## Entry points
//!
//! - [`merge::add_diff`] (usually called as `Builder::add_diff`) replays one
//!   builder's change log onto another.
//! - [`engine::compute_diff`] compares two snapshots entity by entity.
//!
//! ## Guarantees
//!
//! - **Atomicity**: a merge either replays every record or changes nothing.
//! - **Determinism**: diff output is ordered by entity id.
//! - **Non-fatal conflicts**: overlapping edits are resolved by fixed rules
//!   and reported as diagnostics, never as errors.

pub mod engine;
pub mod merge;
pub mod model;

pub use engine::compute_diff;
pub use model::{EntityDelta, MergeConflict, MergeReport, SnapshotDiff};
