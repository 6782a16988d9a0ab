//! Canonical keys for structured log records
//!
//! Every facility logs through these names so records can be filtered
//! uniformly regardless of which operation produced them.

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Entity identifiers
pub const FIELD_ENTITY_ID: &str = "entity_id";
pub const FIELD_ENTITY_TYPE: &str = "entity_type";

// Sizes
pub const FIELD_CHANGE_COUNT: &str = "change_count";
pub const FIELD_ENTITY_COUNT: &str = "entity_count";
pub const FIELD_CONFLICT_COUNT: &str = "conflict_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";
pub const FIELD_ERR_MESSAGE: &str = "err_message";

// Merge diagnostics
pub const FIELD_CONFLICT: &str = "conflict";

// Event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
pub const EVENT_MERGE_CONFLICT: &str = "merge_conflict";
