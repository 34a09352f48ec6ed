use std::io::SeekFrom;
use std::sync::Arc;

use common::storage::{BoxReader, ObjectStore, StorageError, hash_stream};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use tracing::{error, info, instrument, warn};

use super::Owner;
use super::naming::resolve_storage_key;
use crate::config::UploadConfig;
use crate::repository::{FileRecord, FileRepository, NewFileRecord, RepositoryError};
use crate::utils::filename::{extension_lowercase, validate_flat_filename};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    InvalidFilename(&'static str),
    #[error("unsupported audio file type: {0}")]
    UnsupportedMediaType(String),
    #[error("upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },
    #[error("empty uploads are not accepted")]
    EmptyPayload,
    #[error("failed to read upload: {0}")]
    Read(std::io::Error),
    #[error("storage existence check failed: {0}")]
    TransientStorage(StorageError),
    #[error("failed to write object {key}: {source}")]
    StorageWriteFailed { key: String, source: StorageError },
    #[error("failed to persist metadata for {key}: {source}")]
    MetadataWriteFailed {
        key: String,
        source: RepositoryError,
    },
    #[error("metadata lookup failed: {0}")]
    Repository(RepositoryError),
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    /// New bytes were stored under a fresh key.
    Created(FileRecord),
    /// The owner already had these bytes; nothing was written.
    Duplicate(FileRecord),
}

impl UploadOutcome {
    pub fn record(&self) -> &FileRecord {
        match self {
            UploadOutcome::Created(r) | UploadOutcome::Duplicate(r) => r,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, UploadOutcome::Duplicate(_))
    }
}

/// One incoming file. `body` must be rewindable: it is read once to hash and
/// once more to store.
pub struct UploadRequest<R> {
    pub filename: Option<String>,
    /// Media type declared by the client; used only when the extension does
    /// not identify one.
    pub media_type_hint: Option<String>,
    /// Size the client announced, if any. Checked before reading.
    pub declared_size: Option<u64>,
    pub body: R,
}

/// Limits and layout applied to every upload.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_size: u64,
    pub allowed_extensions: Vec<String>,
    pub audio_prefix: String,
    pub allow_empty: bool,
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(cfg: &UploadConfig) -> Self {
        Self {
            max_size: cfg.max_file_size_bytes(),
            allowed_extensions: cfg
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            audio_prefix: cfg.audio_prefix.clone(),
            allow_empty: cfg.allow_empty,
        }
    }
}

impl UploadPolicy {
    /// Resolve the media type for `filename`, rejecting anything that is not
    /// an allowed audio format.
    pub fn check_media_type(
        &self,
        filename: &str,
        hint: Option<&str>,
    ) -> Result<String, UploadError> {
        let unsupported = || UploadError::UnsupportedMediaType(filename.to_string());

        let ext = extension_lowercase(filename).ok_or_else(unsupported)?;
        if !self.allowed_extensions.iter().any(|a| *a == ext) {
            return Err(unsupported());
        }

        let media_type = mime_guess::from_ext(&ext)
            .first()
            .map(|m| m.essence_str().to_string())
            .or_else(|| hint.map(|h| h.trim().to_ascii_lowercase()))
            .ok_or_else(unsupported)?;

        if !media_type.starts_with("audio/") {
            return Err(unsupported());
        }
        Ok(media_type)
    }
}

/// Hash, dedup, name, store and record an upload.
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    files: Arc<dyn FileRepository>,
    policy: UploadPolicy,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        files: Arc<dyn FileRepository>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            files,
            policy,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Run the upload pipeline for `owner`.
    ///
    /// At most one active record exists per `(owner, content hash)`. A blob
    /// written before a failed metadata insert gets one delete attempt and is
    /// logged if that fails too.
    #[instrument(skip(self, request), fields(owner = %owner.username))]
    pub async fn upload<R>(
        &self,
        owner: &Owner,
        request: UploadRequest<R>,
    ) -> Result<UploadOutcome, UploadError>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let UploadRequest {
            filename,
            media_type_hint,
            declared_size,
            mut body,
        } = request;

        let raw_name = filename
            .ok_or_else(|| UploadError::UnsupportedMediaType("missing filename".into()))?;
        let filename = validate_flat_filename(&raw_name)
            .map_err(|e| UploadError::InvalidFilename(e.message()))?
            .to_string();
        let media_type = self
            .policy
            .check_media_type(&filename, media_type_hint.as_deref())?;

        let limit = self.policy.max_size;
        if declared_size.is_some_and(|size| size > limit) {
            return Err(UploadError::PayloadTooLarge { limit });
        }

        let (hash, size) = hash_stream(&mut body, limit).await.map_err(|e| match e {
            StorageError::SizeLimitExceeded { limit, .. } => UploadError::PayloadTooLarge { limit },
            StorageError::Io(io) => UploadError::Read(io),
            other => UploadError::Read(std::io::Error::other(other)),
        })?;

        if size == 0 && !self.policy.allow_empty {
            return Err(UploadError::EmptyPayload);
        }

        if let Some(existing) = self
            .files
            .find_by_owner_and_hash(owner.id, &hash)
            .await
            .map_err(UploadError::Repository)?
        {
            info!(file_id = %existing.id, hash = %hash, "Duplicate upload, returning existing file");
            return Ok(UploadOutcome::Duplicate(existing));
        }

        let resolved = resolve_storage_key(
            self.store.as_ref(),
            &self.policy.audio_prefix,
            &owner.username,
            &filename,
        )
        .await
        .map_err(UploadError::TransientStorage)?;
        let key = resolved.storage_key;

        body.seek(SeekFrom::Start(0))
            .await
            .map_err(UploadError::Read)?;
        let reader: BoxReader = Box::new(body);
        let written = self
            .store
            .put_stream(&key, reader, &media_type)
            .await
            .map_err(|source| UploadError::StorageWriteFailed {
                key: key.clone(),
                source,
            })?;

        if written != size {
            self.discard_orphan(&key).await;
            return Err(UploadError::StorageWriteFailed {
                source: StorageError::Backend(format!(
                    "stored {written} bytes but hashed {size}"
                )),
                key,
            });
        }

        let new_record = NewFileRecord {
            owner_id: owner.id,
            content_hash: hash,
            storage_key: key.clone(),
            original_name: raw_name,
            stored_name: resolved.stored_name,
            byte_size: size,
            media_type,
        };

        match self.files.insert(new_record).await {
            Ok(record) => {
                info!(file_id = %record.id, storage_key = %key, size, "Stored audio file");
                Ok(UploadOutcome::Created(record))
            }
            Err(RepositoryError::DuplicateContent) => {
                // A concurrent upload of the same bytes committed first.
                // When it raced us onto the same key, the blob is its blob.
                let winner = self.files.find_by_owner_and_hash(owner.id, &hash).await;
                self.discard_orphan(&key).await;
                match winner.map_err(UploadError::Repository)? {
                    Some(existing) => {
                        info!(file_id = %existing.id, "Lost dedup race, returning existing file");
                        Ok(UploadOutcome::Duplicate(existing))
                    }
                    None => Err(UploadError::MetadataWriteFailed {
                        key,
                        source: RepositoryError::DuplicateContent,
                    }),
                }
            }
            Err(source) => {
                self.discard_orphan(&key).await;
                Err(UploadError::MetadataWriteFailed { key, source })
            }
        }
    }

    /// One delete attempt for a blob this upload wrote but could not record.
    ///
    /// The key is left alone when an active record already points at it: a
    /// writer that slipped in after the existence check owns those bytes now.
    async fn discard_orphan(&self, key: &str) {
        match self.files.storage_key_in_use(key).await {
            Ok(false) => {}
            Ok(true) => {
                warn!(storage_key = %key, "Blob is owned by a committed record, keeping it");
                return;
            }
            Err(e) => {
                error!(
                    storage_key = %key,
                    error = %e,
                    "Could not check blob ownership, leaving it in storage"
                );
                return;
            }
        }
        match self.store.delete(key).await {
            Ok(()) => warn!(storage_key = %key, "Removed blob without metadata"),
            Err(e) => error!(
                storage_key = %key,
                error = %e,
                "Orphaned blob left in storage, needs reconciliation"
            ),
        }
    }
}
