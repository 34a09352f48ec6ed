use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::transcription_job::{self, JobStatus};

/// A transcription job and where its result goes.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TranscriptionJobResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub status: JobStatus,
    /// Key of the transcript object once `status` is `completed`.
    #[schema(example = "StaticTranscription/alice/song.json")]
    pub result_key: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<transcription_job::Model> for TranscriptionJobResponse {
    fn from(job: transcription_job::Model) -> Self {
        Self {
            id: job.id,
            file_id: job.file_id,
            status: job.status,
            result_key: job.result_key,
            failure_reason: job.failure_reason,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// A transcript object in storage.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TranscriptObject {
    #[schema(example = "StaticTranscription/alice/song.json")]
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TranscriptListResponse {
    pub data: Vec<TranscriptObject>,
}

/// Identifies one transcript object.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TranscriptKeyQuery {
    /// Full object key as returned by the list endpoint.
    pub key: String,
}
