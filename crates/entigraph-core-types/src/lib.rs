//! Types shared by the entigraph error and logging facilities
//!
//! - **Correlation ids**: RequestId, TraceId
//! - **Schema constants**: canonical structured-log field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{RequestId, TraceId};
