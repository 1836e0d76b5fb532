use thiserror::Error;

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Errors raised by audio capture, wake-word spotting and speech recognition
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("unsupported sample format: {0:?}")]
    UnsupportedSampleFormat(cpal::SampleFormat),

    #[error("failed to query input config: {0}")]
    InputConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start input stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("transcription request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transcription service error ({status}): {body}")]
    Transcription { status: u16, body: String },

    #[error("wake word template: {0}")]
    Template(String),

    #[error("wake word template io: {0}")]
    TemplateIo(#[from] std::io::Error),

    #[error("wake word template format: {0}")]
    TemplateFormat(#[from] serde_json::Error),

    #[error("audio buffer poisoned")]
    Poisoned,
}
