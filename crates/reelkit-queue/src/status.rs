//! Canonical job status backend.
//!
//! One Redis hash per job; this is the source of truth for `status(job_id)`
//! across all API processes (an in-process map would be wrong under
//! multiple reactors). Terminal states are monotonic: once a job is
//! SUCCESS/FAILURE/REVOKED, later writes are ignored. Terminal entries
//! expire after an hour, after which reads report PENDING.

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::{debug, warn};

use reelkit_models::{JobId, JobProgress, JobState, JobStatus};

use crate::error::QueueResult;
use crate::progress::ProgressChannel;

/// Result retention after a terminal state.
pub const RESULT_TTL_SECS: u64 = 3600;

/// Whether a state write is allowed given the stored state.
///
/// The only back-edge is `RETRY -> PROGRESS`; terminal states are final.
pub fn transition_allowed(current: Option<JobState>, next: JobState) -> bool {
    match current {
        None => true,
        Some(state) => !state.is_terminal() || state == next,
    }
}

/// Job status store over Redis.
#[derive(Clone)]
pub struct JobStatusStore {
    client: redis::Client,
    namespace: String,
    progress: ProgressChannel,
}

impl JobStatusStore {
    pub fn new(redis_url: &str, namespace: impl Into<String>) -> QueueResult<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            namespace: namespace.into(),
            progress: ProgressChannel::new(redis_url)?,
        })
    }

    pub fn from_env() -> QueueResult<Self> {
        let url =
            std::env::var("QUEUE_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let ns = std::env::var("QUEUE_NAMESPACE").unwrap_or_else(|_| "reelkit".to_string());
        Self::new(&url, ns)
    }

    fn status_key(&self, job_id: &JobId) -> String {
        format!("{}:job:{job_id}", self.namespace)
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Read a job's status. Unknown and expired ids report PENDING.
    pub async fn status(&self, job_id: &JobId) -> QueueResult<JobStatus> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.hget(self.status_key(job_id), "snapshot").await?;

        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(JobStatus::pending(job_id.clone())),
        }
    }

    /// Write a snapshot, honoring the terminal guard, and mirror it on
    /// the progress channel.
    async fn write(&self, status: JobStatus) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let key = self.status_key(&status.job_id);

        let current: Option<String> = conn.hget(&key, "snapshot").await?;
        let current_state = current
            .as_deref()
            .and_then(|json| serde_json::from_str::<JobStatus>(json).ok())
            .map(|s| s.state);

        if !transition_allowed(current_state, status.state) {
            warn!(
                job_id = %status.job_id,
                current = ?current_state,
                attempted = %status.state,
                "Ignoring write past terminal state"
            );
            return Ok(());
        }

        let json = serde_json::to_string(&status)?;
        conn.hset::<_, _, _, ()>(&key, "snapshot", &json).await?;

        if status.state.is_terminal() {
            conn.expire::<_, ()>(&key, RESULT_TTL_SECS as i64).await?;
        }

        debug!(job_id = %status.job_id, state = %status.state, "Status written");
        self.progress.publish(&status).await.ok();
        Ok(())
    }

    /// Record stage progress; state becomes PROGRESS (including the
    /// RETRY back-edge when a retried job starts running again).
    pub async fn set_progress(
        &self,
        job_id: &JobId,
        current: u32,
        total: u32,
        status_text: impl Into<String>,
        attempts: u32,
    ) -> QueueResult<()> {
        self.write(JobStatus {
            job_id: job_id.clone(),
            state: JobState::Progress,
            progress: Some(JobProgress::new(current, total, status_text)),
            result: None,
            error: None,
            attempts,
            eta: None,
        })
        .await
    }

    /// Terminal: SUCCESS with a result payload.
    pub async fn mark_success(
        &self,
        job_id: &JobId,
        result: serde_json::Value,
        attempts: u32,
    ) -> QueueResult<()> {
        self.write(JobStatus {
            job_id: job_id.clone(),
            state: JobState::Success,
            progress: None,
            result: Some(result),
            error: None,
            attempts,
            eta: None,
        })
        .await
    }

    /// Terminal: FAILURE with an error string.
    pub async fn mark_failure(
        &self,
        job_id: &JobId,
        error: impl Into<String>,
        attempts: u32,
    ) -> QueueResult<()> {
        self.write(JobStatus {
            job_id: job_id.clone(),
            state: JobState::Failure,
            progress: None,
            result: None,
            error: Some(error.into()),
            attempts,
            eta: None,
        })
        .await
    }

    /// RETRY with the next scheduled run.
    pub async fn mark_retry(
        &self,
        job_id: &JobId,
        error: impl Into<String>,
        attempts: u32,
        eta: DateTime<Utc>,
    ) -> QueueResult<()> {
        self.write(JobStatus {
            job_id: job_id.clone(),
            state: JobState::Retry,
            progress: Some(JobProgress::new(0, 0, error.into())),
            result: None,
            error: None,
            attempts,
            eta: Some(eta),
        })
        .await
    }

    /// Terminal: REVOKED.
    pub async fn mark_revoked(&self, job_id: &JobId, attempts: u32) -> QueueResult<()> {
        self.write(JobStatus {
            job_id: job_id.clone(),
            state: JobState::Revoked,
            progress: None,
            result: None,
            error: None,
            attempts,
            eta: None,
        })
        .await
    }
}
