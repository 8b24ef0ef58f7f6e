//! Remote streaming ASR provider.
//!
//! Sends the raw WAV bytes to the ASR service and reads back a transcript
//! with word-level timestamps.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use reelkit_models::TranscriptionProvider;

use crate::error::{TranscribeError, TranscribeResult};
use crate::provider::{AsrProvider, ProviderTranscript, Word};

/// Remote calls are bounded; long files still finish well under this.
const REQUEST_TIMEOUT_SECS: u64 = 300;

const DEFAULT_BASE_URL: &str = "https://api.deepgram.com";

pub struct RemoteAsrProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct AsrResponse {
    results: AsrResults,
}

#[derive(Debug, Deserialize)]
struct AsrResults {
    channels: Vec<AsrChannel>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsrChannel {
    alternatives: Vec<AsrAlternative>,
}

#[derive(Debug, Deserialize)]
struct AsrAlternative {
    transcript: String,
    #[serde(default)]
    words: Vec<AsrWord>,
}

#[derive(Debug, Deserialize)]
struct AsrWord {
    word: String,
    start: f64,
    end: f64,
}

impl RemoteAsrProvider {
    pub fn new(api_key: impl Into<String>) -> TranscribeResult<Self> {
        let base_url =
            std::env::var("ASR_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> TranscribeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TranscribeError::provider(format!("client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: std::env::var("ASR_MODEL").unwrap_or_else(|_| "nova-2".to_string()),
        })
    }
}

#[async_trait]
impl AsrProvider for RemoteAsrProvider {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> TranscribeResult<ProviderTranscript> {
        let bytes = tokio::fs::read(audio_path).await?;

        let url = format!(
            "{}/v1/listen?model={}&language={}&punctuate=true",
            self.base_url, self.model, language
        );

        debug!(url = %url, bytes = bytes.len(), "Sending audio to remote ASR");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranscribeError::Timeout(REQUEST_TIMEOUT_SECS)
                } else {
                    TranscribeError::provider(format!("ASR request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::provider(format!(
                "ASR returned {status}: {}",
                body.chars().take(300).collect::<String>()
            )));
        }

        let parsed: AsrResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::provider(format!("malformed ASR response: {e}")))?;

        let alternative = parsed
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .ok_or_else(|| TranscribeError::provider("ASR response had no alternatives"))?;

        Ok(ProviderTranscript {
            text: alternative.transcript.clone(),
            language: parsed.results.language.clone(),
            words: alternative
                .words
                .iter()
                .map(|w| Word {
                    start: w.start,
                    end: w.end,
                    text: w.word.clone(),
                })
                .collect(),
        })
    }

    fn kind(&self) -> TranscriptionProvider {
        TranscriptionProvider::Remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_response() -> serde_json::Value {
        serde_json::json!({
            "results": {
                "language": "pt",
                "channels": [{
                    "alternatives": [{
                        "transcript": "Olá mundo",
                        "words": [
                            {"word": "Olá", "start": 0.0, "end": 0.5},
                            {"word": "mundo", "start": 0.55, "end": 1.0}
                        ]
                    }]
                }]
            }
        })
    }

    #[tokio::test]
    async fn test_remote_transcription_parses_words() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/listen"))
            .and(header("Authorization", "Token test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_response()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("audio.wav");
        tokio::fs::write(&wav, b"RIFFfake").await.unwrap();

        let provider = RemoteAsrProvider::with_base_url("test-key", server.uri()).unwrap();
        let transcript = provider.transcribe(&wav, "pt").await.unwrap();

        assert_eq!(transcript.text, "Olá mundo");
        assert_eq!(transcript.language.as_deref(), Some("pt"));
        assert_eq!(transcript.words.len(), 2);
        assert_eq!(transcript.words[0].text, "Olá");
        assert!((transcript.words[1].start - 0.55).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_remote_5xx_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("audio.wav");
        tokio::fs::write(&wav, b"RIFFfake").await.unwrap();

        let provider = RemoteAsrProvider::with_base_url("k", server.uri()).unwrap();
        let err = provider.transcribe(&wav, "pt").await.unwrap_err();
        assert!(matches!(err, TranscribeError::Provider(_)));
    }
}
