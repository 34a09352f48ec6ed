use common::ObjectStoreConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Pool size. Default: 20.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Token lifetime in minutes. Default: 60.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

fn default_token_ttl_minutes() -> i64 {
    60
}

/// What the delete endpoint does with the metadata row.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Remove the row.
    #[default]
    Hard,
    /// Keep the row with `status = deleted` for auditing.
    Soft,
}

/// Upload policy.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Maximum accepted payload in MiB. Default: 100.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Lowercase extensions without the dot.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Key prefix for audio objects. Default: "StaticAudio".
    #[serde(default = "default_audio_prefix")]
    pub audio_prefix: String,
    /// Key prefix for transcript objects. Default: "StaticTranscription".
    #[serde(default = "default_transcript_prefix")]
    pub transcript_prefix: String,
    /// Lifetime of presigned download URLs. Default: 3600.
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
    /// Accept zero-byte uploads. Default: true.
    #[serde(default = "default_allow_empty")]
    pub allow_empty: bool,
    #[serde(default)]
    pub delete_mode: DeleteMode,
}

fn default_max_file_size_mb() -> u64 {
    100
}
fn default_allowed_extensions() -> Vec<String> {
    ["mp3", "wav", "m4a", "aac", "flac", "ogg"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_audio_prefix() -> String {
    "StaticAudio".into()
}
fn default_transcript_prefix() -> String {
    "StaticTranscription".into()
}
fn default_presign_ttl_secs() -> u64 {
    3600
}
fn default_allow_empty() -> bool {
    true
}

impl UploadConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            allowed_extensions: default_allowed_extensions(),
            audio_prefix: default_audio_prefix(),
            transcript_prefix: default_transcript_prefix(),
            presign_ttl_secs: default_presign_ttl_secs(),
            allow_empty: default_allow_empty(),
            delete_mode: DeleteMode::default(),
        }
    }
}

/// Speech-to-text provider settings.
#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// Whether transcription endpoints and the poller are active. Default: false.
    #[serde(default)]
    pub enabled: bool,
    /// Provider API root. Default: "https://api.assemblyai.com/v2".
    #[serde(default = "default_transcription_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Seconds between provider status scans. Default: 10.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Jobs still queued after this many seconds are failed. Default: 600.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Used when a request does not name a language. Default: "en_us".
    #[serde(default = "default_language_code")]
    pub default_language_code: String,
}

fn default_transcription_base_url() -> String {
    "https://api.assemblyai.com/v2".into()
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_job_timeout_secs() -> u64 {
    600
}
fn default_language_code() -> String {
    "en_us".into()
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_transcription_base_url(),
            api_key: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            job_timeout_secs: default_job_timeout_secs(),
            default_language_code: default_language_code(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: ObjectStoreConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., AUDIOVAULT__AUTH__JWT_SECRET)
            .add_source(
                Environment::with_prefix("AUDIOVAULT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins")
                    .with_list_parse_key("upload.allowed_extensions")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the server insecure or useless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must be set".into()));
        }
        if self.auth.token_ttl_minutes <= 0 {
            return Err(ConfigError::Message(
                "auth.token_ttl_minutes must be positive".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be positive".into(),
            ));
        }
        if self.upload.max_file_size_mb == 0 {
            return Err(ConfigError::Message(
                "upload.max_file_size_mb must be positive".into(),
            ));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::Message(
                "upload.allowed_extensions must not be empty".into(),
            ));
        }
        if self.transcription.enabled && self.transcription.api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "transcription.api_key must be set when transcription is enabled".into(),
            ));
        }
        Ok(())
    }
}
