use async_trait::async_trait;
use chrono::Utc;
use common::storage::ContentHash;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::config::DeleteMode;
use crate::entity::audio_file::{self, FileStatus};

/// A stored audio file as seen by the upload and deletion workflows.
pub type FileRecord = audio_file::Model;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The owner already has an active record with this content hash.
    #[error("an active record with the same content already exists")]
    DuplicateContent,
    #[error("file size {0} does not fit the byte_size column")]
    SizeOutOfRange(u64),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

/// Everything the caller decides about a new record. The repository only
/// adds the identifier, status and timestamps.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub owner_id: i32,
    pub content_hash: ContentHash,
    pub storage_key: String,
    pub original_name: String,
    pub stored_name: String,
    pub byte_size: u64,
    pub media_type: String,
}

/// Metadata store for audio files. All lookups only see active records.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Insert a record in its own transaction.
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, RepositoryError>;

    async fn find_by_owner_and_hash(
        &self,
        owner_id: i32,
        hash: &ContentHash,
    ) -> Result<Option<FileRecord>, RepositoryError>;

    async fn find_by_owner_and_id(
        &self,
        owner_id: i32,
        file_id: Uuid,
    ) -> Result<Option<FileRecord>, RepositoryError>;

    /// Active records for an owner, newest first.
    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<FileRecord>, RepositoryError>;

    /// Whether any active record points at `storage_key`.
    async fn storage_key_in_use(&self, storage_key: &str) -> Result<bool, RepositoryError>;

    /// Remove (or retire) a record in its own transaction.
    ///
    /// Returns `false` if the record was no longer active.
    async fn delete(&self, record: &FileRecord) -> Result<bool, RepositoryError>;
}

/// [`FileRepository`] over the `audio_file` table.
pub struct SeaOrmFileRepository {
    db: DatabaseConnection,
    delete_mode: DeleteMode,
}

impl SeaOrmFileRepository {
    pub fn new(db: DatabaseConnection, delete_mode: DeleteMode) -> Self {
        Self { db, delete_mode }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[async_trait]
impl FileRepository for SeaOrmFileRepository {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, RepositoryError> {
        let byte_size = i64::try_from(record.byte_size)
            .map_err(|_| RepositoryError::SizeOutOfRange(record.byte_size))?;
        let now = Utc::now();
        let model = audio_file::ActiveModel {
            id: Set(Uuid::now_v7()),
            owner_id: Set(record.owner_id),
            content_hash: Set(record.content_hash.to_hex()),
            storage_key: Set(record.storage_key),
            original_name: Set(record.original_name),
            stored_name: Set(record.stored_name),
            byte_size: Set(byte_size),
            media_type: Set(record.media_type),
            status: Set(FileStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let txn = self.db.begin().await?;
        match model.insert(&txn).await {
            Ok(saved) => {
                txn.commit().await?;
                Ok(saved)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed insert also failed");
                }
                if is_unique_violation(&e) {
                    Err(RepositoryError::DuplicateContent)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn find_by_owner_and_hash(
        &self,
        owner_id: i32,
        hash: &ContentHash,
    ) -> Result<Option<FileRecord>, RepositoryError> {
        Ok(audio_file::Entity::find()
            .filter(audio_file::Column::OwnerId.eq(owner_id))
            .filter(audio_file::Column::ContentHash.eq(hash.to_hex()))
            .filter(audio_file::Column::Status.eq(FileStatus::Active))
            .one(&self.db)
            .await?)
    }

    async fn find_by_owner_and_id(
        &self,
        owner_id: i32,
        file_id: Uuid,
    ) -> Result<Option<FileRecord>, RepositoryError> {
        Ok(audio_file::Entity::find_by_id(file_id)
            .filter(audio_file::Column::OwnerId.eq(owner_id))
            .filter(audio_file::Column::Status.eq(FileStatus::Active))
            .one(&self.db)
            .await?)
    }

    async fn list_by_owner(&self, owner_id: i32) -> Result<Vec<FileRecord>, RepositoryError> {
        Ok(audio_file::Entity::find()
            .filter(audio_file::Column::OwnerId.eq(owner_id))
            .filter(audio_file::Column::Status.eq(FileStatus::Active))
            .order_by_desc(audio_file::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn storage_key_in_use(&self, storage_key: &str) -> Result<bool, RepositoryError> {
        Ok(audio_file::Entity::find()
            .filter(audio_file::Column::StorageKey.eq(storage_key))
            .filter(audio_file::Column::Status.eq(FileStatus::Active))
            .one(&self.db)
            .await?
            .is_some())
    }

    async fn delete(&self, record: &FileRecord) -> Result<bool, RepositoryError> {
        let txn = self.db.begin().await?;

        let result = match self.delete_mode {
            DeleteMode::Hard => {
                audio_file::Entity::delete_many()
                    .filter(audio_file::Column::Id.eq(record.id))
                    .filter(audio_file::Column::OwnerId.eq(record.owner_id))
                    .filter(audio_file::Column::Status.eq(FileStatus::Active))
                    .exec(&txn)
                    .await
                    .map(|res| res.rows_affected)
            }
            DeleteMode::Soft => {
                audio_file::Entity::update_many()
                    .col_expr(
                        audio_file::Column::Status,
                        Expr::value(FileStatus::Deleted.to_value()),
                    )
                    .col_expr(audio_file::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(audio_file::Column::Id.eq(record.id))
                    .filter(audio_file::Column::OwnerId.eq(record.owner_id))
                    .filter(audio_file::Column::Status.eq(FileStatus::Active))
                    .exec(&txn)
                    .await
                    .map(|res| res.rows_affected)
            }
        };

        match result {
            Ok(rows) => {
                txn.commit().await?;
                Ok(rows > 0)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed delete also failed");
                }
                Err(e.into())
            }
        }
    }
}
