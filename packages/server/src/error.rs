use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

use crate::repository::RepositoryError;
use crate::services::{DeleteError, UploadError};
use crate::transcription::TranscriptionError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `INVALID_CREDENTIALS`, `NOT_FOUND`, `USERNAME_TAKEN`,
    /// `UNSUPPORTED_MEDIA_TYPE`, `PAYLOAD_TOO_LARGE`, `STORAGE_WRITE_FAILED`,
    /// `STORAGE_UNAVAILABLE`, `PARTIAL_DELETE_FAILURE`, `TRANSCRIPTION_DISABLED`,
    /// `PROVIDER_ERROR`, `INTERNAL_ERROR`.
    #[schema(example = "UNSUPPORTED_MEDIA_TYPE")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Only audio files are accepted")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    NotFound(String),
    UsernameTaken,
    UnsupportedMediaType(String),
    PayloadTooLarge(String),
    /// The object store rejected a write.
    StorageWriteFailed(String),
    /// The object store could not be reached for a read or existence check.
    StorageUnavailable(String),
    /// Metadata is gone but the object could not be removed.
    PartialDeleteFailure { storage_key: String },
    TranscriptionDisabled,
    /// The transcription provider failed or answered with garbage.
    Provider(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "INVALID_CREDENTIALS",
                    message: "Invalid username or password".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::UsernameTaken => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "USERNAME_TAKEN",
                    message: "Username is already taken".into(),
                },
            ),
            AppError::UnsupportedMediaType(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ErrorBody {
                    code: "UNSUPPORTED_MEDIA_TYPE",
                    message: msg,
                },
            ),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody {
                    code: "PAYLOAD_TOO_LARGE",
                    message: msg,
                },
            ),
            AppError::StorageWriteFailed(detail) => {
                tracing::error!("Storage write failed: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        code: "STORAGE_WRITE_FAILED",
                        message: "Failed to store the file".into(),
                    },
                )
            }
            AppError::StorageUnavailable(detail) => {
                tracing::warn!("Storage unavailable: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "STORAGE_UNAVAILABLE",
                        message: "Storage is temporarily unavailable, please retry".into(),
                    },
                )
            }
            AppError::PartialDeleteFailure { storage_key } => {
                tracing::error!(storage_key = %storage_key, "Record deleted but object remains");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "PARTIAL_DELETE_FAILURE",
                        message: "File record was deleted but the stored object could not be removed, please contact support"
                            .into(),
                    },
                )
            }
            AppError::TranscriptionDisabled => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "TRANSCRIPTION_DISABLED",
                    message: "Transcription is not enabled on this server".into(),
                },
            ),
            AppError::Provider(detail) => {
                tracing::error!("Transcription provider error: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        code: "PROVIDER_ERROR",
                        message: "Transcription provider request failed".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => AppError::NotFound("Object not found".into()),
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            other => AppError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::Validation(err.body_text())
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidFilename(msg) => AppError::Validation(msg.into()),
            UploadError::EmptyPayload => AppError::Validation(err.to_string()),
            UploadError::UnsupportedMediaType(_) => AppError::UnsupportedMediaType(err.to_string()),
            UploadError::PayloadTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            UploadError::TransientStorage(_) => AppError::StorageUnavailable(err.to_string()),
            UploadError::StorageWriteFailed { .. } => AppError::StorageWriteFailed(err.to_string()),
            UploadError::Read(_)
            | UploadError::MetadataWriteFailed { .. }
            | UploadError::Repository(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<DeleteError> for AppError {
    fn from(err: DeleteError) -> Self {
        match err {
            DeleteError::NotFound => AppError::NotFound("File not found".into()),
            DeleteError::PartialDeleteFailure { storage_key, .. } => {
                AppError::PartialDeleteFailure { storage_key }
            }
            DeleteError::MetadataWriteFailed(_) | DeleteError::Repository(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<TranscriptionError> for AppError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::InvalidSettings(msg) => AppError::Validation(msg),
            other => AppError::Provider(other.to_string()),
        }
    }
}
