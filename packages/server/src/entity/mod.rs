pub mod audio_file;
pub mod transcription_job;
pub mod user;
