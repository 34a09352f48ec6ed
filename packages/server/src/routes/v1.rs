use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .merge(audio_routes(config))
        .merge(transcription_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::register))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::me))
}

fn audio_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let upload = OpenApiRouter::new()
        .routes(routes!(
            handlers::files::upload_audio,
            handlers::files::list_audio
        ))
        .layer(handlers::files::audio_upload_body_limit(
            config.upload.max_file_size_bytes(),
        ));

    OpenApiRouter::new()
        .routes(routes!(
            handlers::files::get_audio,
            handlers::files::delete_audio
        ))
        .routes(routes!(handlers::files::download_audio))
        .merge(upload)
}

fn transcription_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::transcripts::submit_transcription))
        .routes(routes!(handlers::transcripts::get_transcription))
        .routes(routes!(
            handlers::transcripts::list_transcripts,
            handlers::transcripts::delete_transcript
        ))
        .routes(routes!(handlers::transcripts::download_transcript))
}
