use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a stored audio file.
///
/// Hard-delete mode removes rows outright; soft-delete mode flips them to
/// `Deleted`. Every lookup filters on `Active` either way.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    DeriveActiveEnum,
    EnumIter,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

/// One row per stored audio asset.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audio_file")]
pub struct Model {
    /// Public file identifier (UUIDv7).
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    /// Hex SHA-256 of the uploaded bytes.
    pub content_hash: String,

    /// Object store key. Never rewritten once set.
    pub storage_key: String,

    /// Filename exactly as the client sent it.
    pub original_name: String,

    /// Filename used in the storage key; differs from `original_name` after a
    /// collision rename.
    pub stored_name: String,

    pub byte_size: i64,
    pub media_type: String,

    pub status: FileStatus,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
