//! Content-hash duplicate detection
//!
//! A freshly written artifact is a duplicate when some *other* artifact in its scope has
//! the same content hash. When the answer is uncertain (hash lookup failed, scope could
//! not be listed) the artifact is treated as new.

use crate::store::{ContentHash, ContentStore};
use std::collections::HashMap;

/// Whether `artifact_name` carries content not already present under `scope`
pub async fn is_new(store: &dyn ContentStore, artifact_name: &str, scope: &str) -> bool {
    let hash = match store.list_content_hashes(artifact_name).await {
        Ok(hashes) => match hashes.get(artifact_name) {
            Some(hash) => *hash,
            None => {
                tracing::warn!(artifact = %artifact_name, "artifact missing from store, keeping it");
                return true;
            }
        },
        Err(e) => {
            tracing::warn!(artifact = %artifact_name, error = %e, "hash lookup failed, keeping artifact");
            return true;
        }
    };

    let others = match store.list_content_hashes(scope).await {
        Ok(others) if !others.is_empty() => others,
        Ok(_) => return true,
        Err(e) => {
            tracing::warn!(scope = %scope, error = %e, "could not list dedup scope, keeping artifact");
            return true;
        }
    };

    hash_is_unique_in_list(&hash, &others, artifact_name)
}

/// False iff an entry with a different name has the same hash
pub fn hash_is_unique_in_list(
    hash: &ContentHash,
    others: &HashMap<String, ContentHash>,
    artifact_name: &str,
) -> bool {
    !others
        .iter()
        .any(|(name, other)| other == hash && name != artifact_name)
}
