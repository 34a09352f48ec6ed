use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("{0}")]
    InvalidSettings(String),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected provider response: {0}")]
    Malformed(String),
}

/// Diarization options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SpeakerLabels {
    /// Expected number of distinct speakers (2-10).
    #[schema(example = 2)]
    pub max_speakers: u8,
}

/// Per-request transcription options. Absent fields use server defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TranscriptionSettings {
    /// Language such as `en`, `en_us` or `pt_br`.
    #[schema(example = "en_us")]
    pub language_code: Option<String>,
    pub speaker_labels: Option<SpeakerLabels>,
}

impl TranscriptionSettings {
    pub const MIN_SPEAKERS: u8 = 2;
    pub const MAX_SPEAKERS: u8 = 10;

    /// Check each field on its own and normalise the language code.
    pub fn validated(mut self) -> Result<Self, TranscriptionError> {
        if let Some(code) = self.language_code.take() {
            let code = code.trim().to_ascii_lowercase();
            if !is_language_code(&code) {
                return Err(TranscriptionError::InvalidSettings(format!(
                    "Invalid language code '{code}'"
                )));
            }
            self.language_code = Some(code);
        }
        let speakers = self.speaker_labels.as_ref().map(|l| l.max_speakers);
        if speakers.is_some_and(|n| !(Self::MIN_SPEAKERS..=Self::MAX_SPEAKERS).contains(&n)) {
            return Err(TranscriptionError::InvalidSettings(format!(
                "max_speakers must be between {} and {}",
                Self::MIN_SPEAKERS,
                Self::MAX_SPEAKERS
            )));
        }
        Ok(self)
    }
}

/// `xx`, `xxx`, `xx_yy` or `xxx_yy`, lowercase ASCII letters.
fn is_language_code(code: &str) -> bool {
    let mut parts = code.split('_');
    let lang_ok = parts
        .next()
        .is_some_and(|p| (2..=3).contains(&p.len()) && p.chars().all(|c| c.is_ascii_lowercase()));
    let region_ok = match parts.next() {
        None => true,
        Some(r) => r.len() == 2 && r.chars().all(|c| c.is_ascii_lowercase()),
    };
    lang_ok && region_ok && parts.next().is_none()
}

/// Provider-side state of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderJobStatus {
    Pending,
    /// Full provider payload, stored verbatim as the transcript.
    Completed(Value),
    Failed(String),
}

/// A speech-to-text backend that works asynchronously: submit returns an
/// id, status is polled until the job settles.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Start a job for audio reachable at `audio_url`. Returns the provider's
    /// job id.
    async fn submit(
        &self,
        audio_url: &str,
        settings: &TranscriptionSettings,
    ) -> Result<String, TranscriptionError>;

    async fn status(&self, provider_job_id: &str) -> Result<ProviderJobStatus, TranscriptionError>;
}

/// Client for an AssemblyAI-compatible REST API.
pub struct HttpTranscriptionProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTranscriptionProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, TranscriptionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

fn submit_body(audio_url: &str, settings: &TranscriptionSettings) -> Value {
    let mut body = json!({ "audio_url": audio_url });
    if let Some(code) = &settings.language_code {
        body["language_code"] = json!(code);
    }
    if let Some(labels) = &settings.speaker_labels {
        body["speaker_labels"] = json!(true);
        body["speakers_expected"] = json!(labels.max_speakers);
    }
    body
}

fn parse_status(payload: Value) -> Result<ProviderJobStatus, TranscriptionError> {
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| TranscriptionError::Malformed("missing status".into()))?;
    match status {
        "queued" | "processing" => Ok(ProviderJobStatus::Pending),
        "completed" => Ok(ProviderJobStatus::Completed(payload)),
        "error" => {
            let reason = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("provider reported an error")
                .to_string();
            Ok(ProviderJobStatus::Failed(reason))
        }
        other => Err(TranscriptionError::Malformed(format!(
            "unknown status '{other}'"
        ))),
    }
}

#[async_trait]
impl TranscriptionProvider for HttpTranscriptionProvider {
    #[instrument(skip(self, audio_url))]
    async fn submit(
        &self,
        audio_url: &str,
        settings: &TranscriptionSettings,
    ) -> Result<String, TranscriptionError> {
        let response = self
            .client
            .post(format!("{}/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&submit_body(audio_url, settings))
            .send()
            .await?;
        let payload = Self::read_json(response).await?;
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| TranscriptionError::Malformed("missing job id".into()))?;
        debug!(provider_job_id = id, "Submitted transcription job");
        Ok(id.to_string())
    }

    async fn status(&self, provider_job_id: &str) -> Result<ProviderJobStatus, TranscriptionError> {
        let response = self
            .client
            .get(format!("{}/transcript/{}", self.base_url, provider_job_id))
            .header("authorization", &self.api_key)
            .send()
            .await?;
        parse_status(Self::read_json(response).await?)
    }
}
