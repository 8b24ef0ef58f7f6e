//! Transcription error types.

use thiserror::Error;

pub type TranscribeResult<T> = Result<T, TranscribeError>;

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("ASR provider error: {0}")]
    Provider(String),

    #[error("whisper-cli not found in PATH")]
    WhisperNotFound,

    #[error("Whisper model not found: {0}")]
    ModelNotFound(String),

    #[error("ASR request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Media error: {0}")]
    Media(#[from] reelkit_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Empty transcript")]
    EmptyTranscript,
}

impl TranscribeError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}
