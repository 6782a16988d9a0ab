use entigraph_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every `GraphError` folds into one of these kinds. The kind carries a stable
/// code that callers and tests match on instead of display strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Schema
    SchemaViolation,
    InvalidInput,

    // Lookup
    NotFound,

    // Reference integrity
    DanglingReference,
    InvariantViolation,

    // Merge
    MergeConflict,

    // Integration
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::SchemaViolation => "ERR_SCHEMA_VIOLATION",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::DanglingReference => "ERR_DANGLING_REFERENCE",
            ExErrorKind::InvariantViolation => "ERR_INVARIANT_VIOLATION",
            ExErrorKind::MergeConflict => "ERR_MERGE_CONFLICT",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification plus whatever context the failing operation could attach.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    entity_type: Option<String>,
    field: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            entity_type: None,
            field: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
        }
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Stable error code, e.g. `ERR_NOT_FOUND`
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_type) = &self.entity_type {
            write!(f, " (entity_type: {})", entity_type)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {})", field)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for schema, store, builder and merge operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    // ===== Schema Registration =====
    #[error("Entity type already registered: {type_name}")]
    DuplicateEntityType { type_name: String },

    #[error("Entity type {type_name} extends unregistered type {parent}")]
    UnknownParentType { type_name: String, parent: String },

    #[error("Unknown entity type: {type_name}")]
    UnknownEntityType { type_name: String },

    // ===== Schema Violations =====
    #[error("Cannot instantiate abstract entity type {type_name}")]
    AbstractInstantiation { type_name: String },

    #[error("Entity type {type_name} declares no field '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("Field '{field}' of {type_name} expects {expected}, got {actual}")]
    FieldKindMismatch {
        type_name: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Required field '{field}' of {type_name} is missing")]
    MissingField { type_name: String, field: String },

    #[error("Entity type {type_name} declares no reference '{field}'")]
    UnknownReference { type_name: String, field: String },

    #[error("Reference '{field}' of {type_name} holds at most one entity, got {count}")]
    CardinalityViolation {
        type_name: String,
        field: String,
        count: usize,
    },

    #[error("Reference '{field}' lists {target_id} more than once")]
    DuplicateReference { field: String, target_id: String },

    #[error("Reference '{field}' expects {expected}, but {target_id} is a {actual}")]
    ReferenceTargetMismatch {
        field: String,
        target_id: String,
        expected: String,
        actual: String,
    },

    #[error("Entity {entity_id} is a {actual}, not a {expected}")]
    TypeMismatch {
        entity_id: String,
        expected: String,
        actual: String,
    },

    // ===== Lookup =====
    #[error("Entity not found: {entity_id}")]
    EntityNotFound { entity_id: String },

    // ===== Reference Integrity =====
    #[error("Reference '{field}' of {entity_id} points to missing entity {target_id}")]
    DanglingReference {
        entity_id: String,
        field: String,
        target_id: String,
    },

    #[error("Entity {entity_id} is still referenced by {referrer_id} through '{field}'")]
    ReferencedEntity {
        entity_id: String,
        referrer_id: String,
        field: String,
    },

    #[error("Back-reference index disagrees with forward references of {entity_id}")]
    BackReferenceMismatch { entity_id: String },

    // ===== Merge =====
    #[error("Merge rejected: {reason}")]
    MergeRejected { reason: String },

    // ===== Configuration / Input =====
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid registry key '{key}': {reason}")]
    InvalidRegistryKey { key: String, reason: String },

    // ===== Integration =====
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<GraphError> for ExError {
    fn from(err: GraphError) -> Self {
        let message = err.to_string();
        match err {
            GraphError::DuplicateEntityType { type_name }
            | GraphError::UnknownParentType { type_name, .. } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_op("register_type")
                    .with_entity_type(type_name)
                    .with_message(message)
            }

            GraphError::UnknownEntityType { type_name }
            | GraphError::AbstractInstantiation { type_name } => {
                ExError::new(ExErrorKind::SchemaViolation)
                    .with_entity_type(type_name)
                    .with_message(message)
            }

            GraphError::UnknownField { type_name, field }
            | GraphError::FieldKindMismatch {
                type_name, field, ..
            }
            | GraphError::MissingField { type_name, field }
            | GraphError::UnknownReference { type_name, field }
            | GraphError::CardinalityViolation {
                type_name, field, ..
            } => ExError::new(ExErrorKind::SchemaViolation)
                .with_entity_type(type_name)
                .with_field(field)
                .with_message(message),

            GraphError::DuplicateReference { field, target_id }
            | GraphError::ReferenceTargetMismatch {
                field, target_id, ..
            } => ExError::new(ExErrorKind::SchemaViolation)
                .with_entity_id(target_id)
                .with_field(field)
                .with_message(message),

            GraphError::TypeMismatch {
                entity_id, actual, ..
            } => ExError::new(ExErrorKind::SchemaViolation)
                .with_entity_id(entity_id)
                .with_entity_type(actual)
                .with_message(message),

            GraphError::EntityNotFound { entity_id } => ExError::new(ExErrorKind::NotFound)
                .with_entity_id(entity_id)
                .with_message(message),

            GraphError::DanglingReference {
                entity_id, field, ..
            }
            | GraphError::ReferencedEntity {
                entity_id, field, ..
            } => ExError::new(ExErrorKind::DanglingReference)
                .with_entity_id(entity_id)
                .with_field(field)
                .with_message(message),

            GraphError::BackReferenceMismatch { entity_id } => {
                ExError::new(ExErrorKind::InvariantViolation)
                    .with_entity_id(entity_id)
                    .with_message(message)
            }

            GraphError::MergeRejected { .. } => ExError::new(ExErrorKind::MergeConflict)
                .with_op("add_diff")
                .with_message(message),

            GraphError::InvalidConfig { .. } => ExError::new(ExErrorKind::InvalidInput)
                .with_op("load_config")
                .with_message(message),

            GraphError::InvalidRegistryKey { key, .. } => ExError::new(ExErrorKind::InvalidInput)
                .with_op("registry")
                .with_entity_id(key)
                .with_message(message),

            GraphError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            GraphError::Internal { .. } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes_are_stable() {
        let cases = [
            (ExErrorKind::SchemaViolation, "ERR_SCHEMA_VIOLATION"),
            (ExErrorKind::InvalidInput, "ERR_INVALID_INPUT"),
            (ExErrorKind::NotFound, "ERR_NOT_FOUND"),
            (ExErrorKind::DanglingReference, "ERR_DANGLING_REFERENCE"),
            (ExErrorKind::InvariantViolation, "ERR_INVARIANT_VIOLATION"),
            (ExErrorKind::MergeConflict, "ERR_MERGE_CONFLICT"),
            (ExErrorKind::Serialization, "ERR_SERIALIZATION"),
            (ExErrorKind::Internal, "ERR_INTERNAL"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_schema_errors_carry_type_and_field() {
        let ex: ExError = GraphError::MissingField {
            type_name: "MiddleEntity".into(),
            field: "property".into(),
        }
        .into();

        assert_eq!(ex.kind(), ExErrorKind::SchemaViolation);
        assert_eq!(ex.entity_type(), Some("MiddleEntity"));
        assert_eq!(ex.field(), Some("property"));
    }

    #[test]
    fn test_referenced_entity_maps_to_dangling_reference() {
        let ex: ExError = GraphError::ReferencedEntity {
            entity_id: "e1".into(),
            referrer_id: "e2".into(),
            field: "children".into(),
        }
        .into();

        assert_eq!(ex.code(), "ERR_DANGLING_REFERENCE");
        assert_eq!(ex.entity_id(), Some("e1"));
    }

    #[test]
    fn test_display_includes_code_and_context() {
        let ex = ExError::new(ExErrorKind::NotFound)
            .with_op("modify_entity")
            .with_entity_id("e9")
            .with_message("gone");
        let text = ex.to_string();
        assert!(text.starts_with("[ERR_NOT_FOUND]"));
        assert!(text.contains("modify_entity"));
        assert!(text.contains("e9"));
    }

    #[test]
    fn test_serde_error_becomes_serialization() {
        let err: GraphError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, GraphError::Serialization { .. }));
    }
}
