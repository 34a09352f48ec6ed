use common::storage::{ObjectStore, StorageError};
use tracing::debug;

use crate::utils::filename::split_extension;

/// Upper bound on rename attempts. Each attempt draws 32 random bits, so
/// reaching it means the store answers `exists` wrongly, not bad luck.
const MAX_RENAME_ATTEMPTS: usize = 16;

/// A free storage location for an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// Filename component of the key. Equals the requested name unless it
    /// collided.
    pub stored_name: String,
    pub storage_key: String,
}

/// `{prefix}/{owner}/{filename}` with redundant slashes on the prefix removed.
pub fn compose_key(prefix: &str, owner: &str, filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{owner}/{filename}")
    } else {
        format!("{prefix}/{owner}/{filename}")
    }
}

/// Insert `_{suffix}` before the extension, or append it when there is none.
pub fn with_suffix(filename: &str, suffix: &str) -> String {
    match split_extension(filename) {
        Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{filename}_{suffix}"),
    }
}

/// Eight lowercase hex characters from the thread-local CSPRNG.
pub fn random_suffix() -> String {
    hex::encode(rand::random::<[u8; 4]>())
}

/// Find a key under `prefix/owner/` that does not exist yet.
///
/// The requested name is tried first; after that every attempt uses a fresh
/// random suffix on the original name. Existence-check failures propagate unchanged.
pub async fn resolve_storage_key(
    store: &dyn ObjectStore,
    prefix: &str,
    owner: &str,
    filename: &str,
) -> Result<ResolvedName, StorageError> {
    let mut stored_name = filename.to_string();

    for attempt in 0..MAX_RENAME_ATTEMPTS {
        let storage_key = compose_key(prefix, owner, &stored_name);
        if !store.exists(&storage_key).await? {
            return Ok(ResolvedName {
                stored_name,
                storage_key,
            });
        }
        debug!(storage_key = %storage_key, attempt, "Storage key taken, renaming");
        stored_name = with_suffix(filename, &random_suffix());
    }

    Err(StorageError::Backend(format!(
        "no free storage key for {filename} after {MAX_RENAME_ATTEMPTS} attempts"
    )))
}
