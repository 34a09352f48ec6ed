use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tracing::{debug, info};

use super::error::StorageError;
use super::traits::{BoxReader, ObjectInfo, ObjectStore, check_key};
use crate::config::S3Config;

/// S3-compatible object store backed by a single bucket.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
}

impl S3ObjectStore {
    /// Build the bucket client. No request is made until the first call.
    pub fn new(config: &S3Config) -> Result<Self, StorageError> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse::<Region>()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };

        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials).map_err(backend)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        info!(bucket = %config.bucket, region = %config.region, "Initialized S3 object store");
        Ok(Self { bucket })
    }
}

fn backend(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

/// Map a response status to a storage result.
fn check_status(status: u16, key: &str, op: &str) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(key.to_string())),
        other => Err(StorageError::Backend(format!(
            "{op} {key} returned HTTP {other}"
        ))),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_stream(
        &self,
        key: &str,
        mut reader: BoxReader,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        check_key(key)?;
        let response = self
            .bucket
            .put_object_stream_with_content_type(&mut reader, key, content_type)
            .await
            .map_err(backend)?;
        check_status(response.status_code(), key, "PUT")?;
        debug!(key, bytes = response.uploaded_bytes(), "Uploaded object");
        Ok(response.uploaded_bytes() as u64)
    }

    /// Buffers the object in memory; callers that serve large downloads use
    /// [`ObjectStore::presign_get`] instead.
    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        check_key(key)?;
        let response = match self.bucket.get_object(key).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(backend(e)),
        };
        check_status(response.status_code(), key, "GET")?;
        Ok(Box::new(Cursor::new(response.to_vec())))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        check_key(key)?;
        match self.bucket.head_object(key).await {
            Ok((_, status)) => match check_status(status, key, "HEAD") {
                Ok(()) => Ok(true),
                Err(StorageError::NotFound(_)) => Ok(false),
                Err(e) => Err(e),
            },
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        match self.bucket.delete_object(key).await {
            Ok(response) => match check_status(response.status_code(), key, "DELETE") {
                Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
                Err(e) => Err(e),
            },
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(backend(e)),
        }
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        check_key(key)?;
        let expiry_secs = u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX);
        self.bucket
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(backend)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let pages = self
            .bucket
            .list(prefix.to_string(), None)
            .await
            .map_err(backend)?;

        let objects = pages
            .into_iter()
            .flat_map(|page| page.contents)
            .filter(|object| !object.key.ends_with('/'))
            .map(|object| ObjectInfo {
                last_modified: DateTime::parse_from_rfc3339(&object.last_modified)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                key: object.key,
                size: object.size,
            })
            .collect();

        Ok(objects)
    }
}
