use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use audiovault_server::config::AppConfig;
use audiovault_server::state::AppState;
use audiovault_server::transcription::{
    HttpTranscriptionProvider, TranscriptionProvider, run_transcription_poller,
};
use audiovault_server::{build_router, database, schema};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = database::init_db(&config.database).await?;
    schema::ensure_indexes(&db).await?;

    let store = config
        .storage
        .open()
        .await
        .context("Failed to open object store")?;
    info!(backend = ?config.storage.backend, "Object store ready");

    let transcriber: Option<Arc<dyn TranscriptionProvider>> = if config.transcription.enabled {
        let provider = HttpTranscriptionProvider::new(
            &config.transcription.base_url,
            &config.transcription.api_key,
        )?;
        let provider: Arc<dyn TranscriptionProvider> = Arc::new(provider);
        tokio::spawn(run_transcription_poller(
            db.clone(),
            store.clone(),
            provider.clone(),
            config.transcription.clone(),
        ));
        Some(provider)
    } else {
        info!("Transcription disabled");
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;

    let state = AppState::new(db, config, store, transcriber);
    let app = build_router(state);

    info!("Server running at http://{}", addr);
    info!("Swagger UI at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
