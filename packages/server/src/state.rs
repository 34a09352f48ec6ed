use std::sync::Arc;

use common::storage::ObjectStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::repository::{FileRepository, SeaOrmFileRepository};
use crate::services::{DeletionService, UploadPolicy, UploadService};
use crate::transcription::TranscriptionProvider;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ObjectStore>,
    pub files: Arc<dyn FileRepository>,
    pub uploads: Arc<UploadService>,
    pub deletions: Arc<DeletionService>,
    /// `None` when transcription is disabled.
    pub transcriber: Option<Arc<dyn TranscriptionProvider>>,
}

impl AppState {
    /// Wire the services around one shared store and database handle.
    pub fn new(
        db: DatabaseConnection,
        config: AppConfig,
        store: Arc<dyn ObjectStore>,
        transcriber: Option<Arc<dyn TranscriptionProvider>>,
    ) -> Self {
        let files: Arc<dyn FileRepository> = Arc::new(SeaOrmFileRepository::new(
            db.clone(),
            config.upload.delete_mode,
        ));
        let uploads = Arc::new(UploadService::new(
            store.clone(),
            files.clone(),
            UploadPolicy::from(&config.upload),
        ));
        let deletions = Arc::new(DeletionService::new(store.clone(), files.clone()));

        Self {
            db,
            config: Arc::new(config),
            store,
            files,
            uploads,
            deletions,
            transcriber,
        }
    }
}
