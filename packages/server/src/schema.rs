use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::*;
use tracing::{info, warn};

use crate::entity::transcription_job;

/// Name of the index that keeps one active record per owner and content hash.
pub const ACTIVE_HASH_INDEX: &str = "uq_audio_file_owner_hash_active";

/// Ensure indexes that schema-sync cannot express (partial and composite).
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Partial unique index closing the concurrent duplicate-upload race.
    // Scoped to active rows so soft-deleted history never collides.
    let stmt = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {ACTIVE_HASH_INDEX} \
         ON audio_file (owner_id, content_hash) WHERE status = 'active'"
    );
    // Failure here aborts startup.
    db.execute_unprepared(&stmt).await?;
    info!("Ensured index {ACTIVE_HASH_INDEX} exists");

    // Composite index for the transcription poller:
    // SELECT ... FROM transcription_job WHERE status = 'queued' ORDER BY created_at
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_transcription_job_status_created")
        .table(transcription_job::Entity)
        .col(transcription_job::Column::Status)
        .col(transcription_job::Column::CreatedAt)
        .to_string(PostgresQueryBuilder);

    match db.execute_unprepared(&stmt).await {
        Ok(_) => info!("Ensured index idx_transcription_job_status_created exists"),
        Err(e) => warn!(
            "Failed to create index idx_transcription_job_status_created: {}",
            e
        ),
    }

    Ok(())
}
