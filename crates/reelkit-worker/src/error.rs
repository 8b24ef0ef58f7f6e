//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] reelkit_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] reelkit_queue::QueueError),

    #[error("Store error: {0}")]
    Core(#[from] reelkit_core::CoreError),

    #[error("AI error: {0}")]
    Ai(#[from] reelkit_ai::AiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the job was cancelled by the caller rather than failing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Media(reelkit_media::MediaError::Cancelled))
    }

    /// Transient failures retry with backoff; logic and input errors
    /// never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Media(e) => matches!(
                e,
                reelkit_media::MediaError::DownloadFailed { .. }
                    | reelkit_media::MediaError::Timeout(_)
                    | reelkit_media::MediaError::Io(_)
            ),
            WorkerError::Ai(e) => matches!(
                e,
                reelkit_ai::AiError::Provider(_) | reelkit_ai::AiError::Timeout(_)
            ),
            WorkerError::Queue(_) | WorkerError::Io(_) => true,
            WorkerError::Core(e) => matches!(
                e,
                reelkit_core::CoreError::Storage(_) | reelkit_core::CoreError::Io(_)
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelkit_media::MediaError;

    #[test]
    fn test_retry_classification() {
        assert!(WorkerError::from(MediaError::download_failed("503")).is_retryable());
        assert!(WorkerError::from(MediaError::Timeout(300)).is_retryable());
        assert!(!WorkerError::from(MediaError::invalid_input("bad trim")).is_retryable());
        assert!(!WorkerError::job_failed("logic").is_retryable());
        assert!(WorkerError::from(reelkit_ai::AiError::provider("502")).is_retryable());
        assert!(!WorkerError::from(reelkit_ai::AiError::validation("bad date")).is_retryable());
    }

    #[test]
    fn test_cancelled_is_not_a_failure() {
        let err = WorkerError::from(MediaError::Cancelled);
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
    }
}
