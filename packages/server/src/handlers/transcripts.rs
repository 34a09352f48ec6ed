use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entity::transcription_job::{self, JobStatus};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::file::{DeleteResponse, DownloadUrlResponse};
use crate::models::transcript::{
    TranscriptKeyQuery, TranscriptListResponse, TranscriptObject, TranscriptionJobResponse,
};
use crate::services::naming::compose_key;
use crate::state::AppState;
use crate::transcription::TranscriptionSettings;
use crate::utils::filename::{split_extension, validate_flat_filename};

/// Key prefix holding `username`'s transcripts, with trailing slash.
fn transcript_dir(state: &AppState, username: &str) -> String {
    compose_key(&state.config.upload.transcript_prefix, username, "")
}

/// Accept `key` only if it names a file directly under the caller's
/// transcript directory. Anything else is reported as missing.
fn owned_transcript_key<'a>(
    state: &AppState,
    auth_user: &AuthUser,
    key: &'a str,
) -> Result<&'a str, AppError> {
    let dir = transcript_dir(state, &auth_user.username);
    let not_found = || AppError::NotFound("Transcript not found".into());
    let name = key.strip_prefix(dir.as_str()).ok_or_else(not_found)?;
    match validate_flat_filename(name) {
        Ok(valid) if valid == name => Ok(key),
        _ => Err(not_found()),
    }
}

fn parse_settings(body: &[u8]) -> Result<TranscriptionSettings, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TranscriptionSettings::default());
    }
    let settings: TranscriptionSettings = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid transcription settings: {e}")))?;
    Ok(settings.validated()?)
}

/// Start transcribing an audio file.
#[utoipa::path(
    post,
    path = "/files/audio/{file_id}/transcriptions",
    tag = "Transcriptions",
    operation_id = "submitTranscription",
    summary = "Submit a transcription job",
    description = "Hands the file to the speech-to-text provider and returns immediately. \
        Poll the job until its status is `completed`, then fetch the transcript by `result_key`.",
    params(("file_id" = Uuid, Path, description = "File ID")),
    request_body(content = TranscriptionSettings, description = "Optional settings; an empty body uses server defaults"),
    responses(
        (status = 202, description = "Job accepted", body = TranscriptionJobResponse),
        (status = 400, description = "Bad settings or transcription disabled (VALIDATION_ERROR, TRANSCRIPTION_DISABLED)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No such file for this user (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Provider failed (PROVIDER_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, body), fields(owner_id = auth_user.user_id))]
pub async fn submit_transcription(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let provider = state
        .transcriber
        .clone()
        .ok_or(AppError::TranscriptionDisabled)?;

    let mut settings = parse_settings(&body)?;
    if settings.language_code.is_none() {
        settings.language_code = Some(state.config.transcription.default_language_code.clone());
    }

    let record = state
        .files
        .find_by_owner_and_id(auth_user.user_id, file_id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    let audio_url = state
        .store
        .presign_get(
            &record.storage_key,
            Duration::from_secs(state.config.upload.presign_ttl_secs),
        )
        .await?;
    let provider_job_id = provider.submit(&audio_url, &settings).await?;

    let stem = split_extension(&record.stored_name)
        .map(|(stem, _)| stem)
        .unwrap_or(&record.stored_name);
    let result_key = compose_key(
        &state.config.upload.transcript_prefix,
        &auth_user.username,
        &format!("{stem}.json"),
    );

    let now = Utc::now();
    let job = transcription_job::ActiveModel {
        id: Set(Uuid::now_v7()),
        owner_id: Set(auth_user.user_id),
        file_id: Set(record.id),
        provider_job_id: Set(provider_job_id),
        status: Set(JobStatus::Queued),
        result_key: Set(result_key),
        failure_reason: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    info!(job_id = %job.id, file_id = %record.id, "Queued transcription job");

    Ok((
        StatusCode::ACCEPTED,
        Json(TranscriptionJobResponse::from(job)),
    ))
}

/// Get a transcription job.
#[utoipa::path(
    get,
    path = "/transcriptions/{job_id}",
    tag = "Transcriptions",
    operation_id = "getTranscription",
    summary = "Get transcription job status",
    params(("job_id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job", body = TranscriptionJobResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No such job for this user (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner_id = auth_user.user_id))]
pub async fn get_transcription(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<TranscriptionJobResponse>, AppError> {
    let job = transcription_job::Entity::find_by_id(job_id)
        .filter(transcription_job::Column::OwnerId.eq(auth_user.user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Transcription job not found".into()))?;
    Ok(Json(job.into()))
}

/// List the caller's transcripts.
#[utoipa::path(
    get,
    path = "/files/transcripts",
    tag = "Transcriptions",
    operation_id = "listTranscripts",
    summary = "List transcripts",
    responses(
        (status = 200, description = "Transcript objects", body = TranscriptListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 503, description = "Storage unreachable (STORAGE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner_id = auth_user.user_id))]
pub async fn list_transcripts(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<TranscriptListResponse>, AppError> {
    let objects = state
        .store
        .list(&transcript_dir(&state, &auth_user.username))
        .await?;
    Ok(Json(TranscriptListResponse {
        data: objects
            .into_iter()
            .map(|o| TranscriptObject {
                key: o.key,
                size: o.size,
                last_modified: o.last_modified,
            })
            .collect(),
    }))
}

/// Get a download URL for a transcript.
#[utoipa::path(
    get,
    path = "/files/transcripts/download",
    tag = "Transcriptions",
    operation_id = "downloadTranscript",
    summary = "Presigned transcript URL",
    params(TranscriptKeyQuery),
    responses(
        (status = 200, description = "Download URL", body = DownloadUrlResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No such transcript for this user (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(owner_id = auth_user.user_id))]
pub async fn download_transcript(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<TranscriptKeyQuery>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let key = owned_transcript_key(&state, &auth_user, &query.key)?;
    let ttl = state.config.upload.presign_ttl_secs;
    let url = state
        .store
        .presign_get(key, Duration::from_secs(ttl))
        .await?;
    Ok(Json(DownloadUrlResponse {
        url,
        expires_in: ttl,
    }))
}

/// Delete a transcript.
#[utoipa::path(
    delete,
    path = "/files/transcripts",
    tag = "Transcriptions",
    operation_id = "deleteTranscript",
    summary = "Delete a transcript",
    params(TranscriptKeyQuery),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No such transcript for this user (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(owner_id = auth_user.user_id))]
pub async fn delete_transcript(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<TranscriptKeyQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let key = owned_transcript_key(&state, &auth_user, &query.key)?;
    if !state.store.exists(key).await? {
        return Err(AppError::NotFound("Transcript not found".into()));
    }
    state.store.delete(key).await?;
    info!(key = %key, "Deleted transcript");
    Ok(Json(DeleteResponse {
        message: "Transcript deleted successfully".into(),
    }))
}
