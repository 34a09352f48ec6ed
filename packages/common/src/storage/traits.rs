use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Listing entry returned by [`ObjectStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Key-addressed blob storage.
///
/// Implementations are constructed once at startup and shared behind an
/// `Arc`; every method takes `&self` and must be safe to call concurrently.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the whole stream at `key`, replacing any existing object.
    ///
    /// Returns the number of bytes written.
    async fn put_stream(
        &self,
        key: &str,
        reader: BoxReader,
        content_type: &str,
    ) -> Result<u64, StorageError>;

    /// Store an in-memory buffer at `key`.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<u64, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(key, reader, content_type).await
    }

    /// Open an object as a streaming reader.
    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError>;

    /// Read a whole object into memory.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Check whether an object exists.
    ///
    /// `Ok(false)` is only returned when the backend positively reports the
    /// key as missing; anything else is an error.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Build a time-limited, read-only URL for an object.
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    /// List objects whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError>;
}

/// Reject keys that are empty, absolute or contain `..` segments.
pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key is empty".into()));
    }
    if key.starts_with('/') || key.contains('\\') || key.contains('\0') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
