use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use super::kind::EntityKind;
use super::value::{FieldKind, Value};
use crate::errors::{GraphError, Result};

/// How many entities a reference field may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Zero or one target
    One,
    /// Ordered collection of targets
    Many,
}

/// What a reference field means structurally
///
/// A `Children` reference makes its owner a composite: views expose the
/// targets as the entity's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceRole {
    Children,
    Link,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDef {
    pub name: String,
    pub cardinality: Cardinality,
    /// Declared target type; any subtype is accepted
    pub target: String,
    pub role: ReferenceRole,
}

/// Declaration of one entity type
///
/// Built fluently and handed to `Schema::register`:
///
/// ```
/// use entigraph_core::model::{EntityType, FieldKind};
///
/// let middle = EntityType::concrete("MiddleEntity")
///     .extends("BaseEntity")
///     .field("property", FieldKind::String);
/// assert_eq!(middle.parent(), Some("BaseEntity"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    name: String,
    parent: Option<String>,
    is_abstract: bool,
    fields: Vec<FieldDef>,
    references: Vec<ReferenceDef>,
}

impl EntityType {
    pub fn concrete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            is_abstract: false,
            fields: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Abstract types can be extended and used as handles but never instantiated
    pub fn abstract_type(name: impl Into<String>) -> Self {
        Self {
            is_abstract: true,
            ..Self::concrete(name)
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare a required field
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
            required: false,
        });
        self
    }

    pub fn reference(
        mut self,
        name: impl Into<String>,
        cardinality: Cardinality,
        target: impl Into<String>,
    ) -> Self {
        self.references.push(ReferenceDef {
            name: name.into(),
            cardinality,
            target: target.into(),
            role: ReferenceRole::Link,
        });
        self
    }

    /// Declare the ordered children collection of a composite type
    pub fn children(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.references.push(ReferenceDef {
            name: name.into(),
            cardinality: Cardinality::Many,
            target: target.into(),
            role: ReferenceRole::Children,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Fields declared directly on this type, excluding inherited ones
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// References declared directly on this type, excluding inherited ones
    pub fn references(&self) -> &[ReferenceDef] {
        &self.references
    }
}

/// Registry of entity types with single inheritance
///
/// Types must be registered parent-first, so the inheritance graph can never
/// contain a cycle. A schema is immutable once shared behind an `Arc` by a
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    types: BTreeMap<String, EntityType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEntityType` if the name is taken, `UnknownParentType`
    /// if the parent is not registered yet, and `UnknownEntityType` if a
    /// reference targets an unregistered type other than the type itself.
    pub fn register(&mut self, entity_type: EntityType) -> Result<()> {
        if self.types.contains_key(&entity_type.name) {
            return Err(GraphError::DuplicateEntityType {
                type_name: entity_type.name,
            });
        }

        if let Some(parent) = &entity_type.parent {
            if !self.types.contains_key(parent) {
                return Err(GraphError::UnknownParentType {
                    type_name: entity_type.name.clone(),
                    parent: parent.clone(),
                });
            }
        }

        for reference in &entity_type.references {
            if reference.target != entity_type.name && !self.types.contains_key(&reference.target)
            {
                return Err(GraphError::UnknownEntityType {
                    type_name: reference.target.clone(),
                });
            }
        }

        self.types.insert(entity_type.name.clone(), entity_type);
        Ok(())
    }

    /// Register the declaration of a typed handle
    ///
    /// # Errors
    ///
    /// Same as [`Schema::register`].
    pub fn register_kind<T: EntityKind>(&mut self) -> Result<()> {
        self.register(T::entity_type())
    }

    /// Chaining form of [`Schema::register`]
    ///
    /// # Errors
    ///
    /// Same as [`Schema::register`].
    pub fn with_type(mut self, entity_type: EntityType) -> Result<Self> {
        self.register(entity_type)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `UnknownEntityType` if no type with that name is registered.
    pub fn get(&self, name: &str) -> Result<&EntityType> {
        self.types
            .get(name)
            .ok_or_else(|| GraphError::UnknownEntityType {
                type_name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// The type itself followed by its ancestors, nearest first
    pub fn ancestry<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a EntityType> + 'a {
        let mut current = self.types.get(name);
        std::iter::from_fn(move || {
            let ty = current?;
            current = ty.parent.as_deref().and_then(|p| self.types.get(p));
            Some(ty)
        })
    }

    /// Reflexive: every type is a subtype of itself
    pub fn is_subtype(&self, child: &str, ancestor: &str) -> bool {
        self.ancestry(child).any(|ty| ty.name == ancestor)
    }

    /// All registered types that are `name` or descend from it, by name
    pub fn subtypes_of(&self, name: &str) -> Vec<&str> {
        self.types
            .keys()
            .filter(|candidate| self.is_subtype(candidate, name))
            .map(String::as_str)
            .collect()
    }

    /// Look up a field declared on the type or inherited
    pub fn field_def(&self, type_name: &str, field: &str) -> Option<&FieldDef> {
        self.ancestry(type_name)
            .flat_map(|ty| ty.fields.iter())
            .find(|def| def.name == field)
    }

    pub fn reference_def(&self, type_name: &str, field: &str) -> Option<&ReferenceDef> {
        self.ancestry(type_name)
            .flat_map(|ty| ty.references.iter())
            .find(|def| def.name == field)
    }

    /// Every field visible on the type, nearest declaration winning
    pub fn all_fields(&self, type_name: &str) -> Vec<&FieldDef> {
        let mut seen = HashSet::new();
        self.ancestry(type_name)
            .flat_map(|ty| ty.fields.iter())
            .filter(|def| seen.insert(def.name.as_str()))
            .collect()
    }

    pub fn all_references(&self, type_name: &str) -> Vec<&ReferenceDef> {
        let mut seen = HashSet::new();
        self.ancestry(type_name)
            .flat_map(|ty| ty.references.iter())
            .filter(|def| seen.insert(def.name.as_str()))
            .collect()
    }

    /// The children collection of a composite type, if it has one
    pub fn children_reference(&self, type_name: &str) -> Option<&ReferenceDef> {
        self.ancestry(type_name)
            .flat_map(|ty| ty.references.iter())
            .find(|def| def.role == ReferenceRole::Children)
    }

    /// Check a single field value against the type's declaration
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` or `FieldKindMismatch`.
    pub fn check_field(&self, type_name: &str, field: &str, value: &Value) -> Result<()> {
        let def = self
            .field_def(type_name, field)
            .ok_or_else(|| GraphError::UnknownField {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })?;

        if def.kind != value.kind() {
            return Err(GraphError::FieldKindMismatch {
                type_name: type_name.to_string(),
                field: field.to_string(),
                expected: def.kind.to_string(),
                actual: value.kind().to_string(),
            });
        }
        Ok(())
    }

    /// Check the shape of a reference collection (declaration, cardinality,
    /// duplicates). Target existence is checked against a store by the caller.
    ///
    /// # Errors
    ///
    /// Returns `UnknownReference`, `CardinalityViolation` or `DuplicateReference`.
    pub fn check_reference(
        &self,
        type_name: &str,
        field: &str,
        targets: &[EntityId],
    ) -> Result<&ReferenceDef> {
        let def = self
            .reference_def(type_name, field)
            .ok_or_else(|| GraphError::UnknownReference {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })?;

        if def.cardinality == Cardinality::One && targets.len() > 1 {
            return Err(GraphError::CardinalityViolation {
                type_name: type_name.to_string(),
                field: field.to_string(),
                count: targets.len(),
            });
        }

        let mut seen = HashSet::new();
        for target in targets {
            if !seen.insert(*target) {
                return Err(GraphError::DuplicateReference {
                    field: field.to_string(),
                    target_id: target.to_string(),
                });
            }
        }
        Ok(def)
    }

    /// Check that `type_name` may be instantiated with the given fields
    /// and reference collections
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType`, `AbstractInstantiation`, `MissingField`,
    /// or any error from [`Schema::check_field`] / [`Schema::check_reference`].
    pub fn check_shape(
        &self,
        type_name: &str,
        fields: &BTreeMap<String, Value>,
        references: &BTreeMap<String, Vec<EntityId>>,
    ) -> Result<()> {
        let ty = self.get(type_name)?;
        if ty.is_abstract {
            return Err(GraphError::AbstractInstantiation {
                type_name: type_name.to_string(),
            });
        }

        for (name, value) in fields {
            self.check_field(type_name, name, value)?;
        }

        if let Some(missing) = self
            .all_fields(type_name)
            .into_iter()
            .find(|def| def.required && !fields.contains_key(&def.name))
        {
            return Err(GraphError::MissingField {
                type_name: type_name.to_string(),
                field: missing.name.clone(),
            });
        }

        for (name, targets) in references {
            self.check_reference(type_name, name, targets)?;
        }
        Ok(())
    }
}
