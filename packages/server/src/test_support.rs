//! In-memory stand-ins for the object store and the metadata repository,
//! with switches for injecting failures.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::storage::{BoxReader, ContentHash, ObjectInfo, ObjectStore, StorageError};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::config::DeleteMode;
use crate::entity::audio_file::{self, FileStatus};
use crate::repository::{FileRecord, FileRepository, NewFileRecord, RepositoryError};

/// True if `name` is `{stem}_{8 lowercase hex}.{ext}`.
pub fn is_suffixed(name: &str, stem: &str, ext: &str) -> bool {
    let Some(rest) = name.strip_prefix(&format!("{stem}_")) else {
        return false;
    };
    let Some(suffix) = rest.strip_suffix(&format!(".{ext}")) else {
        return false;
    };
    suffix.len() == 8 && suffix.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_put: AtomicBool,
    fail_delete: AtomicBool,
    fail_exists: AtomicBool,
    report_absent: AtomicBool,
    deleted: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Keys passed to `delete`, including failed attempts.
    pub fn delete_calls(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_put(&self, on: bool) {
        self.fail_put.store(on, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, on: bool) {
        self.fail_delete.store(on, Ordering::SeqCst);
    }

    pub fn fail_exists(&self, on: bool) {
        self.fail_exists.store(on, Ordering::SeqCst);
    }

    /// Make `exists` answer `false` for every key, as when another writer
    /// lands between the existence check and the put.
    pub fn report_absent(&self, on: bool) {
        self.report_absent.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_stream(
        &self,
        key: &str,
        mut reader: BoxReader,
        _content_type: &str,
    ) -> Result<u64, StorageError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected put failure".into()));
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let len = data.len() as u64;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(len)
    }

    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        let data = self
            .object(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        if self.fail_exists.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected exists failure".into()));
        }
        if self.report_absent.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self.contains(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deleted.lock().unwrap().push(key.to_string());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected delete failure".into()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        if !self.contains(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!("memory://{key}?ttl={}", ttl.as_secs()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let now = Utc::now();
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
                last_modified: now,
            })
            .collect())
    }
}

/// Mimics the partial unique index on `(owner_id, content_hash)` for
/// active rows.
#[derive(Default)]
pub struct MemoryFileRepository {
    records: Mutex<Vec<FileRecord>>,
    fail_insert: AtomicBool,
    fail_delete: AtomicBool,
    hide_next_hash_lookup: AtomicBool,
    delete_mode: DeleteMode,
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delete_mode(delete_mode: DeleteMode) -> Self {
        Self {
            delete_mode,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<FileRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn active_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == FileStatus::Active)
            .count()
    }

    pub fn fail_insert(&self, on: bool) {
        self.fail_insert.store(on, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, on: bool) {
        self.fail_delete.store(on, Ordering::SeqCst);
    }

    /// Make the next hash lookup miss, as if a concurrent upload committed
    /// right after it.
    pub fn hide_next_hash_lookup(&self) {
        self.hide_next_hash_lookup.store(true, Ordering::SeqCst);
    }

    /// Seed a committed active record.
    pub fn seed(&self, owner_id: i32, data: &[u8], storage_key: &str) -> FileRecord {
        let stored_name = storage_key.rsplit('/').next().unwrap_or(storage_key);
        let now = Utc::now();
        let record = audio_file::Model {
            id: Uuid::now_v7(),
            owner_id,
            content_hash: ContentHash::compute(data).to_hex(),
            storage_key: storage_key.to_string(),
            original_name: stored_name.to_string(),
            stored_name: stored_name.to_string(),
            byte_size: data.len() as i64,
            media_type: "audio/mpeg".into(),
            status: FileStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.records.lock().unwrap().push(record.clone());
        record
    }
}

#[async_trait]
impl FileRepository for MemoryFileRepository {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, RepositoryError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(RepositoryError::Db(sea_orm::DbErr::Custom(
                "injected insert failure".into(),
            )));
        }
        let mut records = self.records.lock().unwrap();
        let hash = record.content_hash.to_hex();
        if records.iter().any(|r| {
            r.owner_id == record.owner_id && r.content_hash == hash && r.status == FileStatus::Active
        }) {
            return Err(RepositoryError::DuplicateContent);
        }
        let byte_size = i64::try_from(record.byte_size)
            .map_err(|_| RepositoryError::SizeOutOfRange(record.byte_size))?;
        let now = Utc::now();
        let model = audio_file::Model {
            id: Uuid::now_v7(),
            owner_id: record.owner_id,
            content_hash: hash,
            storage_key: record.storage_key,
            original_name: record.original_name,
            stored_name: record.stored_name,
            byte_size,
            media_type: record.media_type,
            status: FileStatus::Active,
            created_at: now,
            updated_at: now,
        };
        records.push(model.clone());
        Ok(model)
    }

    async fn find_by_owner_and_hash(
        &self,
        owner_id: i32,
        hash: &ContentHash,
    ) -> Result<Option<FileRecord>, RepositoryError> {
        if self.hide_next_hash_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let hash = hash.to_hex();
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.owner_id == owner_id && r.content_hash == hash && r.status == FileStatus::Active)
            .cloned())
    }

    async fn find_by_owner_and_id(
        &self,
        owner_id: i32,
        file_id: Uuid,
    ) -> Result<Option<FileRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.owner_id == owner_id && r.id == file_id && r.status == FileStatus::Active)
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<FileRecord>, RepositoryError> {
        let mut out: Vec<FileRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id && r.status == FileStatus::Active)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn storage_key_in_use(&self, storage_key: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.storage_key == storage_key && r.status == FileStatus::Active))
    }

    async fn delete(&self, record: &FileRecord) -> Result<bool, RepositoryError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(RepositoryError::Db(sea_orm::DbErr::Custom(
                "injected delete failure".into(),
            )));
        }
        let mut records = self.records.lock().unwrap();
        let matches = |r: &FileRecord| {
            r.id == record.id && r.owner_id == record.owner_id && r.status == FileStatus::Active
        };
        match self.delete_mode {
            DeleteMode::Hard => {
                let before = records.len();
                records.retain(|r| !matches(r));
                Ok(records.len() < before)
            }
            DeleteMode::Soft => match records.iter_mut().find(|r| matches(r)) {
                Some(row) => {
                    row.status = FileStatus::Deleted;
                    row.updated_at = Utc::now();
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }
}
