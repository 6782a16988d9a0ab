//! Immutable snapshots of the entity graph.
//!
//! ## Responsibilities
//!
//! - Hold entities grouped per concrete type, in creation order
//! - Keep a reverse index of references for O(referrers) removal checks
//! - Share unchanged buckets and entities between snapshot versions
//! - Expose polymorphic queries, reference resolution and views
//! - Compute a deterministic content digest
//!
//! ## Non-Responsibilities
//!
//! - Mutation (handled by `builder` through `apply`)
//! - Persistence to disk

mod bucket;
pub mod digest;
pub mod snapshot;
pub mod view;

pub use digest::compute_snapshot_digest;
pub use snapshot::{BackRef, EntitiesOfType, Snapshot};
pub use view::{CompositeView, EntityView, LeafView};
