//! Correlation ids attached to errors and log records
//!
//! Both ids are UUIDv7 strings so they sort by creation time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! correlation_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh id
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Wrap an id received from elsewhere
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

correlation_id!(
    /// Identifies one caller-level request (a batch of builder operations, a merge)
    RequestId
);

correlation_id!(
    /// Identifies a trace that may span several requests
    TraceId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_non_empty() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());

        let t1 = TraceId::new();
        let t2 = TraceId::new();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_ids_sort_by_creation() {
        let first = RequestId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = RequestId::new();
        assert!(first < second);
    }

    #[test]
    fn test_display_matches_inner_string() {
        let id = TraceId::from_string("trace-42");
        assert_eq!(id.to_string(), "trace-42");
        assert_eq!(id.as_str(), "trace-42");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = RequestId::from_string("req-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"req-1\"");
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
