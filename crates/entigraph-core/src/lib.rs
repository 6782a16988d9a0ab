//! Entigraph Core - versioned in-memory entity graph
//!
//! This crate provides:
//! - A schema of entity types with single inheritance, abstract types,
//!   typed fields and typed references (including composite children)
//! - Immutable snapshots that share unchanged structure between versions
//! - Builders that record changes, materialize new snapshots and merge
//!   each other's change logs (`add_diff`)
//! - Invariant checks, snapshot comparison and content digests
//! - A process-wide registry of plugin-contributed configuration keys

pub mod apply;
pub mod builder;
pub mod changes;
pub mod config;
pub mod diff;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod ops;
pub mod policy;
pub mod registry;
pub mod rules;
pub mod store;

pub use entigraph_core_types as types;

// Re-export commonly used types
pub use apply::apply;
pub use builder::{Builder, Modifiable, NewEntity};
pub use changes::Change;
pub use config::{EngineConfig, RemovalMode};
pub use diff::{compute_diff, MergeConflict, MergeReport, SnapshotDiff};
pub use errors::{ExError, ExErrorKind, GraphError, Result};
pub use model::{
    Cardinality, Entity, EntityId, EntityKind, EntityType, FieldKind, ReferenceRole, Schema, Value,
};
pub use policy::{CascadePolicy, RejectReferencedPolicy, RemovalPolicy, SelectedCascadePolicy};
pub use store::{CompositeView, EntityView, LeafView, Snapshot};
