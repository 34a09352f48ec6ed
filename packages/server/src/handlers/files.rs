use std::path::{Path as FsPath, PathBuf};
use std::time::Duration;

use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tokio::io::AsyncWriteExt;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::file::{
    DeleteResponse, DownloadUrlResponse, FileListResponse, FileResponse, UploadResponse,
};
use crate::services::{UploadOutcome, UploadPolicy, UploadRequest};
use crate::state::AppState;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn audio_upload_body_limit(max_file_size: u64) -> DefaultBodyLimit {
    let limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    DefaultBodyLimit::max(limit)
}

/// A multipart `file` field copied to local disk.
#[derive(Debug)]
struct SpooledFile {
    path: PathBuf,
    filename: Option<String>,
    content_type: Option<String>,
    size: u64,
}

impl SpooledFile {
    async fn remove(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "Failed to remove upload spool file");
        }
    }
}

/// Copy a multipart field to a temp file, failing once it exceeds `max_size`.
async fn spool_field(
    mut field: axum::extract::multipart::Field<'_>,
    dir: &FsPath,
    max_size: u64,
) -> Result<SpooledFile, AppError> {
    let path = dir.join(format!("audiovault-upload-{}", Uuid::new_v4()));
    let filename = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);

    let result = async {
        let mut temp_file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;

        let mut total_size: u64 = 0;
        while let Some(chunk) = field.chunk().await? {
            total_size += chunk.len() as u64;
            if total_size > max_size {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds maximum size of {max_size} bytes"
                )));
            }
            temp_file
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }

        temp_file
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;
        Ok::<u64, AppError>(total_size)
    }
    .await;

    match result {
        Ok(size) => Ok(SpooledFile {
            path,
            filename,
            content_type,
            size,
        }),
        Err(e) => {
            // Best effort.
            let _ = tokio::fs::remove_file(&path).await;
            Err(e)
        }
    }
}

/// Spool the first `file` field of `multipart` to `dir`.
///
/// Nothing is left on disk when this returns an error, including errors from
/// parts that arrive after the file.
async fn spool_upload(
    multipart: &mut Multipart,
    policy: &UploadPolicy,
    dir: &FsPath,
) -> Result<SpooledFile, AppError> {
    let mut spooled: Option<SpooledFile> = None;

    let result = async {
        while let Some(field) = multipart.next_field().await? {
            if field.name() != Some("file") || spooled.is_some() {
                continue;
            }
            // Reject by name before reading the body.
            let name = field.file_name().ok_or_else(|| {
                AppError::UnsupportedMediaType("File field must have a filename".into())
            })?;
            policy.check_media_type(name, field.content_type())?;

            spooled = Some(spool_field(field, dir, policy.max_size).await?);
        }
        Ok::<(), AppError>(())
    }
    .await;

    match (result, spooled) {
        (Ok(()), Some(file)) => Ok(file),
        (Ok(()), None) => Err(AppError::Validation("Missing 'file' field".into())),
        (Err(e), file) => {
            if let Some(file) = file {
                file.remove().await;
            }
            Err(e)
        }
    }
}

/// Upload an audio file.
#[utoipa::path(
    post,
    path = "/files/audio",
    tag = "Audio Files",
    operation_id = "uploadAudio",
    summary = "Upload an audio file",
    description = "Stores the `file` multipart field. Uploading bytes you already stored returns \
        the existing record with status 200 and writes nothing. A name that is already taken \
        gets a random `_xxxxxxxx` suffix before the extension.",
    request_body(content_type = "multipart/form-data", description = "Audio file in the `file` field"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 200, description = "Identical file already stored", body = UploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 413, description = "Too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
        (status = 415, description = "Not audio (UNSUPPORTED_MEDIA_TYPE)", body = ErrorBody),
        (status = 502, description = "Storage rejected the write (STORAGE_WRITE_FAILED)", body = ErrorBody),
        (status = 503, description = "Storage unreachable (STORAGE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(owner_id = auth_user.user_id))]
pub async fn upload_audio(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let spool_dir = std::env::temp_dir();
    let spooled = spool_upload(&mut multipart, state.uploads.policy(), &spool_dir).await?;

    let outcome = async {
        let body = tokio::fs::File::open(&spooled.path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {e}")))?;
        let request = UploadRequest {
            filename: spooled.filename.clone(),
            media_type_hint: spooled.content_type.clone(),
            declared_size: Some(spooled.size),
            body,
        };
        Ok::<_, AppError>(state.uploads.upload(&auth_user.owner(), request).await?)
    }
    .await;

    spooled.remove().await;

    match outcome? {
        UploadOutcome::Created(record) => Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "File uploaded successfully".into(),
                duplicate: false,
                file: record.into(),
            }),
        )),
        UploadOutcome::Duplicate(record) => Ok((
            StatusCode::OK,
            Json(UploadResponse {
                message: "File already exists".into(),
                duplicate: true,
                file: record.into(),
            }),
        )),
    }
}

/// List the caller's audio files.
#[utoipa::path(
    get,
    path = "/files/audio",
    tag = "Audio Files",
    operation_id = "listAudio",
    summary = "List audio files",
    responses(
        (status = 200, description = "Files, newest first", body = FileListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner_id = auth_user.user_id))]
pub async fn list_audio(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, AppError> {
    let records = state.files.list_by_owner(auth_user.user_id).await?;
    Ok(Json(FileListResponse {
        data: records.into_iter().map(Into::into).collect(),
    }))
}

async fn find_owned(
    state: &AppState,
    auth_user: &AuthUser,
    file_id: Uuid,
) -> Result<crate::repository::FileRecord, AppError> {
    state
        .files
        .find_by_owner_and_id(auth_user.user_id, file_id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))
}

/// Get one audio file's metadata.
#[utoipa::path(
    get,
    path = "/files/audio/{file_id}",
    tag = "Audio Files",
    operation_id = "getAudio",
    summary = "Get audio file metadata",
    params(("file_id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No such file for this user (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner_id = auth_user.user_id))]
pub async fn get_audio(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<Json<FileResponse>, AppError> {
    Ok(Json(find_owned(&state, &auth_user, file_id).await?.into()))
}

/// Get a time-limited download URL.
#[utoipa::path(
    get,
    path = "/files/audio/{file_id}/download",
    tag = "Audio Files",
    operation_id = "downloadAudio",
    summary = "Presigned download URL",
    params(("file_id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Download URL", body = DownloadUrlResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No such file for this user (NOT_FOUND)", body = ErrorBody),
        (status = 503, description = "Storage unreachable (STORAGE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner_id = auth_user.user_id))]
pub async fn download_audio(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let record = find_owned(&state, &auth_user, file_id).await?;
    let ttl = state.config.upload.presign_ttl_secs;
    let url = state
        .store
        .presign_get(&record.storage_key, Duration::from_secs(ttl))
        .await?;
    Ok(Json(DownloadUrlResponse {
        url,
        expires_in: ttl,
    }))
}

/// Delete an audio file.
#[utoipa::path(
    delete,
    path = "/files/audio/{file_id}",
    tag = "Audio Files",
    operation_id = "deleteAudio",
    summary = "Delete an audio file",
    description = "Removes the record, then the stored object. If the second step fails the \
        record stays deleted and the response is PARTIAL_DELETE_FAILURE.",
    params(("file_id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Deleted", body = DeleteResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No such file for this user (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Object left behind (PARTIAL_DELETE_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(owner_id = auth_user.user_id))]
pub async fn delete_audio(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, AppError> {
    state
        .deletions
        .delete(&auth_user.owner(), file_id)
        .await?;
    Ok(Json(DeleteResponse {
        message: "File deleted successfully".into(),
    }))
}
