//! Content digest for snapshots.
//!
//! The digest covers every entity (id, runtime type, fields, references) in
//! id order, serialized as canonical JSON and hashed with SHA-256. It does
//! not cover `materialized_at`, so materializing the same content twice
//! yields the same digest.

use sha2::{Digest, Sha256};

use super::snapshot::Snapshot;
use crate::errors::Result;
use crate::model::Entity;

/// Compute the content digest of a snapshot.
///
/// ## Returns
///
/// Hex-encoded SHA-256 digest (64 characters)
///
/// ## Errors
///
/// Returns `GraphError::Serialization` if JSON serialization fails.
pub fn compute_snapshot_digest(snapshot: &Snapshot) -> Result<String> {
    let mut entities: Vec<&Entity> = snapshot.iter().map(|entity| entity.as_ref()).collect();
    entities.sort_by_key(|entity| entity.id());
    let canonical = serde_json::to_string(&entities)?;
    Ok(hash_string(&canonical))
}

fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
