pub mod poller;
mod provider;

pub use poller::run_transcription_poller;
pub use provider::{
    HttpTranscriptionProvider, ProviderJobStatus, SpeakerLabels, TranscriptionError,
    TranscriptionProvider, TranscriptionSettings,
};
