use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::repository::FileRecord;

/// Metadata of a stored audio file.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    pub id: Uuid,
    /// Filename as uploaded.
    #[schema(example = "song.mp3")]
    pub original_name: String,
    /// Filename in storage; carries a random suffix after a name collision.
    #[schema(example = "song_1a2b3c4d.mp3")]
    pub stored_name: String,
    #[schema(example = "StaticAudio/alice/song_1a2b3c4d.mp3")]
    pub storage_key: String,
    /// Hex SHA-256 of the file contents.
    pub content_hash: String,
    #[schema(example = 5242880)]
    pub byte_size: i64,
    #[schema(example = "audio/mpeg")]
    pub media_type: String,
    pub created_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponse {
    fn from(r: FileRecord) -> Self {
        Self {
            id: r.id,
            original_name: r.original_name,
            stored_name: r.stored_name,
            storage_key: r.storage_key,
            content_hash: r.content_hash,
            byte_size: r.byte_size,
            media_type: r.media_type,
            created_at: r.created_at,
        }
    }
}

/// Result of an upload. `duplicate` is true when the same bytes were already
/// stored for this user and nothing new was written.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    #[schema(example = "File uploaded successfully")]
    pub message: String,
    pub duplicate: bool,
    pub file: FileResponse,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FileListResponse {
    /// Newest first.
    pub data: Vec<FileResponse>,
}

/// Time-limited download link.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DownloadUrlResponse {
    pub url: String,
    /// Seconds until the link stops working.
    #[schema(example = 3600)]
    pub expires_in: u64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeleteResponse {
    #[schema(example = "File deleted successfully")]
    pub message: String,
}
