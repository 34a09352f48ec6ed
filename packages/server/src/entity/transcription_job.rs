use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

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
pub enum JobStatus {
    /// Submitted to the provider, result not collected yet.
    #[sea_orm(string_value = "queued")]
    Queued,
    /// Transcript written to `result_key`.
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// A transcription request tracked until the provider finishes it.
///
/// `file_id` is deliberately not a foreign key: jobs outlive the audio file
/// they were created for.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transcription_job")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub owner_id: i32,

    #[sea_orm(indexed)]
    pub file_id: Uuid,

    /// Identifier assigned by the transcription provider.
    pub provider_job_id: String,

    #[sea_orm(indexed)]
    pub status: JobStatus,

    /// Object key the transcript is written to on completion.
    pub result_key: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub failure_reason: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
