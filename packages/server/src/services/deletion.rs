use std::sync::Arc;

use common::storage::{ObjectStore, StorageError};
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::Owner;
use crate::repository::{FileRecord, FileRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum DeleteError {
    /// No active file with this id belongs to the caller.
    #[error("file not found")]
    NotFound,
    #[error("metadata lookup failed: {0}")]
    Repository(RepositoryError),
    /// The record is untouched and the object was never deleted.
    #[error("failed to remove file metadata: {0}")]
    MetadataWriteFailed(RepositoryError),
    /// The record is gone but the object is still in storage.
    #[error("record removed but object {storage_key} could not be deleted: {source}")]
    PartialDeleteFailure {
        storage_key: String,
        source: StorageError,
    },
}

/// Removes a file's metadata first and its object second.
pub struct DeletionService {
    store: Arc<dyn ObjectStore>,
    files: Arc<dyn FileRepository>,
}

impl DeletionService {
    pub fn new(store: Arc<dyn ObjectStore>, files: Arc<dyn FileRepository>) -> Self {
        Self { store, files }
    }

    /// Delete `file_id` on behalf of `owner`.
    ///
    /// Files owned by someone else are reported exactly like missing ones.
    #[instrument(skip(self), fields(owner = %owner.username))]
    pub async fn delete(&self, owner: &Owner, file_id: Uuid) -> Result<FileRecord, DeleteError> {
        let record = self
            .files
            .find_by_owner_and_id(owner.id, file_id)
            .await
            .map_err(DeleteError::Repository)?
            .ok_or(DeleteError::NotFound)?;

        let removed = self
            .files
            .delete(&record)
            .await
            .map_err(DeleteError::MetadataWriteFailed)?;
        if !removed {
            // A concurrent delete got there first.
            return Err(DeleteError::NotFound);
        }

        if let Err(source) = self.store.delete(&record.storage_key).await {
            error!(
                file_id = %record.id,
                storage_key = %record.storage_key,
                error = %source,
                "Metadata removed but object delete failed"
            );
            return Err(DeleteError::PartialDeleteFailure {
                storage_key: record.storage_key,
                source,
            });
        }

        info!(file_id = %record.id, storage_key = %record.storage_key, "Deleted audio file");
        Ok(record)
    }
}
