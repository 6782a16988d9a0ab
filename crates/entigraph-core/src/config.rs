//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.
//!
//! ```
//! use entigraph_core::config::{EngineConfig, RemovalMode};
//!
//! let config = EngineConfig::from_json_str(r#"{ "removal": "cascade" }"#).unwrap();
//! assert_eq!(config.removal, RemovalMode::Cascade);
//! assert!(!config.validate_on_materialize);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, Result};
use crate::logging_facility::{self, Profile};

/// What `Builder::remove_entity` does with an entity that is still referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalMode {
    /// Refuse with `ReferencedEntity`
    #[default]
    Reject,
    /// Detach from referrers, then remove
    Cascade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub log_profile: Profile,
    pub removal: RemovalMode,
    /// Run the full invariant check in `to_storage`; O(store size)
    pub validate_on_materialize: bool,
    /// Log each merge conflict at warn level
    pub report_merge_conflicts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_profile: Profile::default(),
            removal: RemovalMode::default(),
            validate_on_materialize: false,
            report_merge_conflicts: true,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config document
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for malformed JSON, unknown keys or bad values.
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| GraphError::InvalidConfig {
            reason: e.to_string(),
        })
    }

    /// Initialize logging with the configured profile
    pub fn init_logging(&self) {
        logging_facility::init(self.log_profile);
    }
}
