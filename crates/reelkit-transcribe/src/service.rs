//! Dual-provider transcription service with automatic local fallback.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use reelkit_core::Credential;
use reelkit_media::download::download_to;
use reelkit_media::ops::extract_audio;
use reelkit_models::TranscriptionResult;

use crate::error::TranscribeResult;
use crate::local::LocalWhisperProvider;
use crate::normalize::normalize;
use crate::provider::AsrProvider;
use crate::remote::RemoteAsrProvider;

/// Default transcript language for Brazilian content.
pub const DEFAULT_LANGUAGE: &str = "pt";

/// Transcription front door.
///
/// The remote provider is preferred when configured; any failure there
/// falls back to the local model exactly once. The `provider` field of the
/// result names whichever one succeeded.
pub struct TranscriptionService {
    remote: Option<Arc<dyn AsrProvider>>,
    local: Arc<dyn AsrProvider>,
}

impl TranscriptionService {
    pub fn new(remote: Option<Arc<dyn AsrProvider>>, local: Arc<dyn AsrProvider>) -> Self {
        Self { remote, local }
    }

    /// Build from the environment: remote iff `ASR_API_KEY` holds a real
    /// credential, local whisper otherwise.
    pub fn from_env() -> TranscribeResult<Self> {
        let remote: Option<Arc<dyn AsrProvider>> = match Credential::from_env("ASR_API_KEY") {
            Some(key) => {
                info!("Remote ASR configured as primary transcription provider");
                Some(Arc::new(RemoteAsrProvider::new(key.expose())?))
            }
            None => {
                info!("No remote ASR credential; using local whisper only");
                None
            }
        };

        Ok(Self::new(remote, Arc::new(LocalWhisperProvider::from_env())))
    }

    /// Transcribe a blob URL. Downloads the video, extracts ASR-ready
    /// audio, runs the providers and normalizes the output. Temp files
    /// live in a scoped directory removed on every exit path.
    pub async fn transcribe(
        &self,
        url: &str,
        language: Option<&str>,
    ) -> TranscribeResult<TranscriptionResult> {
        let language = language.unwrap_or(DEFAULT_LANGUAGE);
        let scratch = tempfile::tempdir()?;

        let video_path = scratch.path().join("source.bin");
        download_to(url, &video_path).await?;

        let audio_path = scratch.path().join("audio.wav");
        extract_audio(&video_path, &audio_path).await?;

        self.transcribe_audio(&audio_path, language).await
    }

    /// Run the provider chain over an extracted WAV file.
    pub async fn transcribe_audio(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> TranscribeResult<TranscriptionResult> {
        let primary = self.remote.as_ref().unwrap_or(&self.local);

        match primary.transcribe(audio_path, language).await {
            Ok(raw) => Ok(normalize(raw, language, primary.kind())),
            Err(e) if self.remote.is_some() => {
                warn!(error = %e, "Remote ASR failed, falling back to local model");
                let raw = self.local.transcribe(audio_path, language).await?;
                Ok(normalize(raw, language, self.local.kind()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use reelkit_models::TranscriptionProvider;

    use crate::error::TranscribeError;
    use crate::provider::{ProviderTranscript, Word};

    struct StubProvider {
        kind: TranscriptionProvider,
        fail: bool,
        calls: AtomicU32,
    }

    impl StubProvider {
        fn new(kind: TranscriptionProvider, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl AsrProvider for StubProvider {
        async fn transcribe(
            &self,
            _audio_path: &Path,
            _language: &str,
        ) -> TranscribeResult<ProviderTranscript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TranscribeError::provider("stub failure"));
            }
            Ok(ProviderTranscript {
                text: "Olá mundo".to_string(),
                language: Some("pt".to_string()),
                words: vec![
                    Word {
                        start: 0.0,
                        end: 0.5,
                        text: "Olá".to_string(),
                    },
                    Word {
                        start: 0.55,
                        end: 1.0,
                        text: "mundo".to_string(),
                    },
                ],
            })
        }

        fn kind(&self) -> TranscriptionProvider {
            self.kind
        }
    }

    #[tokio::test]
    async fn test_remote_success_skips_local() {
        let remote = StubProvider::new(TranscriptionProvider::Remote, false);
        let local = StubProvider::new(TranscriptionProvider::Local, false);
        let service = TranscriptionService::new(Some(remote.clone()), local.clone());

        let result = service
            .transcribe_audio(Path::new("/tmp/audio.wav"), "pt")
            .await
            .unwrap();

        assert_eq!(result.provider, TranscriptionProvider::Remote);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_once() {
        let remote = StubProvider::new(TranscriptionProvider::Remote, true);
        let local = StubProvider::new(TranscriptionProvider::Local, false);
        let service = TranscriptionService::new(Some(remote.clone()), local.clone());

        let result = service
            .transcribe_audio(Path::new("/tmp/audio.wav"), "pt")
            .await
            .unwrap();

        assert_eq!(result.provider, TranscriptionProvider::Local);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(local.calls.load(Ordering::SeqCst), 1);
        assert!(result.segments_are_ordered());
    }

    #[tokio::test]
    async fn test_both_failing_surfaces_local_error() {
        let remote = StubProvider::new(TranscriptionProvider::Remote, true);
        let local = StubProvider::new(TranscriptionProvider::Local, true);
        let service = TranscriptionService::new(Some(remote), local.clone());

        let err = service
            .transcribe_audio(Path::new("/tmp/audio.wav"), "pt")
            .await
            .unwrap_err();

        assert!(matches!(err, TranscribeError::Provider(_)));
        assert_eq!(local.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_only_does_not_retry() {
        let local = StubProvider::new(TranscriptionProvider::Local, true);
        let service = TranscriptionService::new(None, local.clone());

        service
            .transcribe_audio(Path::new("/tmp/audio.wav"), "pt")
            .await
            .unwrap_err();

        assert_eq!(local.calls.load(Ordering::SeqCst), 1);
    }
}
