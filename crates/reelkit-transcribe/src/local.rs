//! Local on-box ASR via whisper.cpp's `whisper-cli`.
//!
//! The binary is a protocol-level consumer like the FFmpeg toolchain: args
//! are passed as arrays, exit status is checked, stderr becomes the error
//! message. `-ml 1` makes each emitted segment word-granular; segments are
//! flattened into words in order.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use reelkit_models::TranscriptionProvider;

use crate::error::{TranscribeError, TranscribeResult};
use crate::provider::{AsrProvider, ProviderTranscript, Word};

pub struct LocalWhisperProvider {
    model_path: PathBuf,
}

/// whisper.cpp `-oj` sidecar format.
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
    #[serde(default)]
    result: Option<WhisperResultMeta>,
}

#[derive(Debug, Deserialize)]
struct WhisperResultMeta {
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    /// Milliseconds
    from: u64,
    /// Milliseconds
    to: u64,
}

impl LocalWhisperProvider {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
        }
    }

    pub fn from_env() -> Self {
        let model = std::env::var("WHISPER_MODEL")
            .unwrap_or_else(|_| "/opt/models/ggml-base.bin".to_string());
        Self::new(model)
    }

    fn parse_output(raw: &[u8]) -> TranscribeResult<ProviderTranscript> {
        let parsed: WhisperOutput = serde_json::from_slice(raw)?;

        let words: Vec<Word> = parsed
            .transcription
            .iter()
            .filter_map(|seg| {
                let text = seg.text.trim();
                if text.is_empty() || seg.offsets.to <= seg.offsets.from {
                    return None;
                }
                Some(Word {
                    start: seg.offsets.from as f64 / 1000.0,
                    end: seg.offsets.to as f64 / 1000.0,
                    text: text.to_string(),
                })
            })
            .collect();

        if words.is_empty() {
            return Err(TranscribeError::EmptyTranscript);
        }

        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(ProviderTranscript {
            text,
            language: parsed.result.and_then(|r| r.language),
            words,
        })
    }
}

#[async_trait]
impl AsrProvider for LocalWhisperProvider {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> TranscribeResult<ProviderTranscript> {
        which::which("whisper-cli").map_err(|_| TranscribeError::WhisperNotFound)?;

        if !self.model_path.exists() {
            return Err(TranscribeError::ModelNotFound(
                self.model_path.display().to_string(),
            ));
        }

        let out_dir = tempfile::tempdir()?;
        let out_prefix = out_dir.path().join("transcript");

        debug!(
            audio = %audio_path.display(),
            model = %self.model_path.display(),
            language,
            "Running whisper-cli"
        );

        let output = Command::new("whisper-cli")
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(audio_path)
            .arg("-l")
            .arg(language)
            .args(["-ml", "1", "-oj", "-np"])
            .arg("-of")
            .arg(&out_prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscribeError::provider(format!(
                "whisper-cli exited with {:?}: {}",
                output.status.code(),
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        let json_path = out_prefix.with_extension("json");
        let raw = tokio::fs::read(&json_path).await?;

        Self::parse_output(&raw)
    }

    fn kind(&self) -> TranscriptionProvider {
        TranscriptionProvider::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_word_segments() {
        let raw = br#"{
            "result": {"language": "pt"},
            "transcription": [
                {"offsets": {"from": 0, "to": 500}, "text": " Olá"},
                {"offsets": {"from": 550, "to": 1000}, "text": " mundo"},
                {"offsets": {"from": 1000, "to": 1000}, "text": " "}
            ]
        }"#;

        let transcript = LocalWhisperProvider::parse_output(raw).unwrap();
        assert_eq!(transcript.text, "Olá mundo");
        assert_eq!(transcript.language.as_deref(), Some("pt"));
        assert_eq!(transcript.words.len(), 2);
        assert!((transcript.words[0].start - 0.0).abs() < 1e-9);
        assert!((transcript.words[0].end - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_output_empty_is_error() {
        let raw = br#"{"transcription": []}"#;
        assert!(matches!(
            LocalWhisperProvider::parse_output(raw),
            Err(TranscribeError::EmptyTranscript)
        ));
    }

    #[tokio::test]
    async fn test_missing_model_is_typed_error() {
        // Only meaningful when whisper-cli is installed; otherwise the
        // binary check fires first, which is also a typed error.
        let provider = LocalWhisperProvider::new("/nonexistent/model.bin");
        let err = provider
            .transcribe(Path::new("/nonexistent/audio.wav"), "pt")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TranscribeError::WhisperNotFound | TranscribeError::ModelNotFound(_)
        ));
    }
}
