//! Pluggable ASR provider trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use reelkit_models::TranscriptionProvider;

use crate::error::TranscribeResult;

/// One timed word from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Raw provider output before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTranscript {
    /// Full transcript text (may be empty; rebuilt from words when absent)
    pub text: String,
    /// Detected or requested language
    pub language: Option<String>,
    /// Timed words in emission order
    pub words: Vec<Word>,
}

/// Trait for ASR backends.
#[async_trait]
pub trait AsrProvider: Send + Sync {
    /// Transcribe a 16 kHz mono WAV file.
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> TranscribeResult<ProviderTranscript>;

    /// Which provider this is, for the result's `provider` field.
    fn kind(&self) -> TranscriptionProvider;
}
