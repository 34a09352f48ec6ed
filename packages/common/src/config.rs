use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::storage::filesystem::FilesystemObjectStore;
use crate::storage::{ObjectStore, StorageError};

/// Which object store implementation to construct.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreBackend {
    /// Local directory, for development and tests.
    #[default]
    Filesystem,
    /// S3 or an S3-compatible service (MinIO, R2, ...).
    S3,
}

/// Connection settings for the S3 backend.
#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    pub bucket: String,
    /// Region name. Default: "us-east-1".
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Falls back to the standard AWS credential chain when unset.
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`). Default: true.
    #[serde(default = "default_path_style")]
    pub path_style: bool,
}

/// Object storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub backend: ObjectStoreBackend,
    /// Root directory for the filesystem backend. Default: "./data/objects".
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Required when `backend = "s3"`.
    #[serde(default)]
    pub s3: Option<S3Config>,
}

fn default_region() -> String {
    "us-east-1".into()
}
fn default_path_style() -> bool {
    true
}
fn default_root() -> PathBuf {
    PathBuf::from("./data/objects")
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            backend: ObjectStoreBackend::default(),
            root: default_root(),
            s3: None,
        }
    }
}

impl ObjectStoreConfig {
    /// Construct the configured store. Called once at startup.
    pub async fn open(&self) -> Result<Arc<dyn ObjectStore>, StorageError> {
        match self.backend {
            ObjectStoreBackend::Filesystem => {
                Ok(Arc::new(FilesystemObjectStore::new(&self.root).await?))
            }
            ObjectStoreBackend::S3 => self.open_s3(),
        }
    }

    #[cfg(feature = "object-storage")]
    fn open_s3(&self) -> Result<Arc<dyn ObjectStore>, StorageError> {
        let s3 = self.s3.as_ref().ok_or_else(|| {
            StorageError::Backend("storage.backend is \"s3\" but [storage.s3] is missing".into())
        })?;
        Ok(Arc::new(crate::storage::s3::S3ObjectStore::new(s3)?))
    }

    #[cfg(not(feature = "object-storage"))]
    fn open_s3(&self) -> Result<Arc<dyn ObjectStore>, StorageError> {
        Err(StorageError::Backend(
            "built without the `object-storage` feature".into(),
        ))
    }
}
