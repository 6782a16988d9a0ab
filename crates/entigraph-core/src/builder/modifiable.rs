use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::errors::{GraphError, Result};
use crate::model::{Entity, EntityId, EntityKind, Schema, Value};

/// Mutable handle passed to the closure of `Builder::modify_entity`
///
/// Reads see the entity's current values overlaid with writes made through
/// this handle. Writes are only recorded here; they are validated and applied
/// together once the closure returns, and only the names actually written end
/// up in the change log.
///
/// `T` is the handle type the caller asked for. It may be the entity's runtime
/// type or any ancestor of it; writes are limited to what `T` declares.
pub struct Modifiable<'a, T: EntityKind> {
    schema: &'a Schema,
    current: &'a Entity,
    fields: BTreeMap<String, Option<Value>>,
    references: BTreeMap<String, Vec<EntityId>>,
    error: Option<GraphError>,
    _kind: PhantomData<fn() -> T>,
}

impl<'a, T: EntityKind> Modifiable<'a, T> {
    pub(crate) fn new(schema: &'a Schema, current: &'a Entity) -> Self {
        Self {
            schema,
            current,
            fields: BTreeMap::new(),
            references: BTreeMap::new(),
            error: None,
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> EntityId {
        self.current.id()
    }

    /// The entity as it was before this modification
    pub fn current(&self) -> &Entity {
        self.current
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name) {
            Some(pending) => pending.as_ref(),
            None => self.current.field(name),
        }
    }

    pub fn references(&self, name: &str) -> &[EntityId] {
        match self.references.get(name) {
            Some(pending) => pending,
            None => self.current.references(name),
        }
    }

    /// Children of a composite handle, in order
    pub fn children(&self) -> &[EntityId] {
        match self.schema.children_reference(T::NAME) {
            Some(def) => self.references(&def.name),
            None => &[],
        }
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.to_string(), Some(value.into()));
        self
    }

    /// Clear an optional field
    pub fn unset(&mut self, field: &str) -> &mut Self {
        self.fields.insert(field.to_string(), None);
        self
    }

    /// Replace a whole reference collection
    pub fn set_references(
        &mut self,
        field: &str,
        targets: impl IntoIterator<Item = EntityId>,
    ) -> &mut Self {
        self.references
            .insert(field.to_string(), targets.into_iter().collect());
        self
    }

    /// Replace the children collection declared on `T` or inherited by it
    pub fn set_children(&mut self, children: impl IntoIterator<Item = EntityId>) -> &mut Self {
        let schema = self.schema;
        match schema.children_reference(T::NAME) {
            Some(def) => self.set_references(&def.name, children),
            None => {
                self.error.get_or_insert(GraphError::UnknownReference {
                    type_name: T::NAME.to_string(),
                    field: "children".to_string(),
                });
                self
            }
        }
    }

    /// Recorded deltas, provided every written name is declared on `T`
    pub(crate) fn into_delta(
        self,
    ) -> Result<(
        BTreeMap<String, Option<Value>>,
        BTreeMap<String, Vec<EntityId>>,
    )> {
        if let Some(err) = self.error {
            return Err(err);
        }

        if let Some(name) = self
            .fields
            .keys()
            .find(|name| self.schema.field_def(T::NAME, name).is_none())
        {
            return Err(GraphError::UnknownField {
                type_name: T::NAME.to_string(),
                field: name.clone(),
            });
        }

        if let Some(name) = self
            .references
            .keys()
            .find(|name| self.schema.reference_def(T::NAME, name).is_none())
        {
            return Err(GraphError::UnknownReference {
                type_name: T::NAME.to_string(),
                field: name.clone(),
            });
        }

        Ok((self.fields, self.references))
    }
}
