//! Job identity and status reporting.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job state as reported by the result backend.
///
/// Transitions are monotonic except the `Retry -> Progress` back-edge;
/// terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Queued, or unknown to the backend
    #[default]
    Pending,
    /// A worker is executing the job
    Progress,
    /// Completed with a result payload
    Success,
    /// Failed permanently with an error string
    Failure,
    /// Failed transiently; scheduled for another attempt
    Retry,
    /// Revoked by the caller
    Revoked,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Progress => "PROGRESS",
            JobState::Success => "SUCCESS",
            JobState::Failure => "FAILURE",
            JobState::Retry => "RETRY",
            JobState::Revoked => "REVOKED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Success | JobState::Failure | JobState::Revoked
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobState::Pending),
            "PROGRESS" => Ok(JobState::Progress),
            "SUCCESS" => Ok(JobState::Success),
            "FAILURE" => Ok(JobState::Failure),
            "RETRY" => Ok(JobState::Retry),
            "REVOKED" => Ok(JobState::Revoked),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// Progress tuple written by workers between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobProgress {
    pub current: u32,
    pub total: u32,
    pub status_text: String,
}

impl JobProgress {
    pub fn new(current: u32, total: u32, status_text: impl Into<String>) -> Self {
        Self {
            current,
            total,
            status_text: status_text.into(),
        }
    }

    /// Progress as a 0-100 percentage.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current as u64 * 100) / self.total as u64).min(100) as u8
    }
}

/// Snapshot of a job as seen through `status(job_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStatus {
    pub job_id: JobId,

    #[serde(default)]
    pub state: JobState,

    /// Only meaningful in PROGRESS/RETRY
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,

    /// Populated iff state is SUCCESS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Populated iff state is FAILURE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Attempt counter (first run is attempt 1)
    #[serde(default)]
    pub attempts: u32,

    /// Next scheduled run, for RETRY
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
}

impl JobStatus {
    /// The status reported for ids the backend does not know (expired or
    /// never enqueued).
    pub fn pending(job_id: JobId) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            progress: None,
            result: None,
            error: None,
            attempts: 0,
            eta: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Success.is_terminal());
        assert!(JobState::Failure.is_terminal());
        assert!(JobState::Revoked.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Progress.is_terminal());
        assert!(!JobState::Retry.is_terminal());
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [
            JobState::Pending,
            JobState::Progress,
            JobState::Success,
            JobState::Failure,
            JobState::Retry,
            JobState::Revoked,
        ] {
            let parsed: JobState = state.as_str().parse().unwrap();
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(JobProgress::new(0, 0, "start").percent(), 0);
        assert_eq!(JobProgress::new(2, 5, "stage").percent(), 40);
        assert_eq!(JobProgress::new(7, 5, "over").percent(), 100);
    }
}
