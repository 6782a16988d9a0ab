pub mod entity;
pub mod kind;
pub mod schema;
pub mod value;

pub use entity::{Entity, EntityId};
pub use kind::EntityKind;
pub use schema::{Cardinality, EntityType, FieldDef, ReferenceDef, ReferenceRole, Schema};
pub use value::{FieldKind, Value};
