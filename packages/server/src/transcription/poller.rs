use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::storage::ObjectStore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value;
use tracing::{error, info, warn};

use super::{ProviderJobStatus, TranscriptionError, TranscriptionProvider};
use crate::config::TranscriptionConfig;
use crate::entity::transcription_job::{self, JobStatus};

/// Jobs examined per scan.
const SCAN_BATCH: u64 = 100;

/// What to do with a queued job after asking the provider about it.
#[derive(Debug, PartialEq)]
pub enum JobAction {
    Wait,
    Complete(Value),
    Fail(String),
}

/// Configured job timeout, saturating instead of wrapping for huge values.
fn job_timeout(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Decide a queued job's fate from the provider's answer and the job's age.
pub fn next_action(
    status: Result<ProviderJobStatus, TranscriptionError>,
    age: chrono::Duration,
    timeout: chrono::Duration,
) -> JobAction {
    match status {
        Ok(ProviderJobStatus::Completed(payload)) => JobAction::Complete(payload),
        Ok(ProviderJobStatus::Failed(reason)) => JobAction::Fail(reason),
        Ok(ProviderJobStatus::Pending) if age > timeout => JobAction::Fail(format!(
            "Timed out after {} seconds",
            timeout.num_seconds()
        )),
        Ok(ProviderJobStatus::Pending) => JobAction::Wait,
        Err(e) if age > timeout => JobAction::Fail(format!("Provider unreachable: {e}")),
        Err(e) => {
            warn!(error = %e, "Provider status check failed, will retry");
            JobAction::Wait
        }
    }
}

/// Run the transcription poller as a background task.
pub async fn run_transcription_poller(
    db: DatabaseConnection,
    store: Arc<dyn ObjectStore>,
    provider: Arc<dyn TranscriptionProvider>,
    config: TranscriptionConfig,
) {
    info!(
        poll_interval_secs = config.poll_interval_secs,
        job_timeout_secs = config.job_timeout_secs,
        "Starting transcription poller"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.poll_interval_secs.max(1)));
    let timeout = job_timeout(config.job_timeout_secs);

    loop {
        interval.tick().await;

        if let Err(e) = poll_queued_jobs(&db, store.as_ref(), provider.as_ref(), timeout).await {
            error!(error = %e, "Transcription poll failed");
        }
    }
}

/// Advance every queued job by one step.
pub async fn poll_queued_jobs(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    provider: &dyn TranscriptionProvider,
    timeout: chrono::Duration,
) -> anyhow::Result<()> {
    let jobs = transcription_job::Entity::find()
        .filter(transcription_job::Column::Status.eq(JobStatus::Queued))
        .order_by_asc(transcription_job::Column::CreatedAt)
        .limit(SCAN_BATCH)
        .all(db)
        .await?;

    for job in jobs {
        let job_id = job.id;
        if let Err(e) = advance_job(db, store, provider, job, timeout).await {
            error!(%job_id, error = %e, "Failed to advance transcription job");
        }
    }

    Ok(())
}

async fn advance_job(
    db: &DatabaseConnection,
    store: &dyn ObjectStore,
    provider: &dyn TranscriptionProvider,
    job: transcription_job::Model,
    timeout: chrono::Duration,
) -> anyhow::Result<()> {
    let age = Utc::now() - job.created_at;
    let status = provider.status(&job.provider_job_id).await;

    match next_action(status, age, timeout) {
        JobAction::Wait => Ok(()),
        JobAction::Complete(payload) => {
            let bytes = serde_json::to_vec_pretty(&payload)?;
            store
                .put(&job.result_key, &bytes, "application/json")
                .await?;

            let job_id = job.id;
            let result_key = job.result_key.clone();
            let mut active: transcription_job::ActiveModel = job.into();
            active.status = Set(JobStatus::Completed);
            active.updated_at = Set(Utc::now());
            active.update(db).await?;

            info!(%job_id, result_key = %result_key, "Transcription completed");
            Ok(())
        }
        JobAction::Fail(reason) => {
            let job_id = job.id;
            let mut active: transcription_job::ActiveModel = job.into();
            active.status = Set(JobStatus::Failed);
            active.failure_reason = Set(Some(reason.clone()));
            active.updated_at = Set(Utc::now());
            active.update(db).await?;

            warn!(%job_id, reason = %reason, "Transcription failed");
            Ok(())
        }
    }
}
