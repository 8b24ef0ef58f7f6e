//! Video records and lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::subtitle::SubtitleStyle;
use crate::transcript::TranscriptionResult;

/// Unique identifier for an organization (the multi-tenant boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct OrgId(pub String);

impl OrgId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrgId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
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

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Created from a saved script, no media yet
    #[default]
    Draft,
    /// Original file stored, not yet processed
    Uploaded,
    /// A processing job is running
    Processing,
    /// Pipeline finished, output stored
    Processed,
    /// Published/usable
    Ready,
    /// Pipeline failed
    Failed,
    /// Processing was revoked by the caller
    Cancelled,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Draft => "draft",
            VideoStatus::Uploaded => "uploaded",
            VideoStatus::Processing => "processing",
            VideoStatus::Processed => "processed",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
            VideoStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses eligible for garbage collection.
    pub fn is_collectable(&self) -> bool {
        matches!(self, VideoStatus::Failed | VideoStatus::Cancelled)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Technical metadata captured by the probe step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoTechMetadata {
    #[serde(default)]
    pub video_codec: String,
    #[serde(default)]
    pub audio_codec: String,
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub size_bytes: u64,
}

/// A video owned by an organization.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Unique video ID
    pub id: VideoId,

    /// Owning organization
    pub org_id: OrgId,

    /// Display title
    pub title: String,

    /// Original blob URL
    pub source_url: String,

    /// Processed blob URL (set by the pipeline)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_url: Option<String>,

    /// Duration in seconds
    #[serde(default)]
    pub duration_secs: f64,

    /// Normalized transcription payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<TranscriptionResult>,

    /// Subtitle style snapshot used for the last burn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_style: Option<SubtitleStyle>,

    /// Lifecycle status
    #[serde(default)]
    pub status: VideoStatus,

    /// Probe metadata
    #[serde(default)]
    pub metadata: VideoTechMetadata,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Create a new record in `uploaded` state.
    pub fn new_uploaded(
        id: VideoId,
        org_id: OrgId,
        title: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            org_id,
            title: title.into(),
            source_url: source_url.into(),
            processed_url: None,
            duration_secs: 0.0,
            transcription: None,
            subtitle_style: None,
            status: VideoStatus::Uploaded,
            metadata: VideoTechMetadata::default(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as processing.
    pub fn mark_processing(mut self) -> Self {
        self.status = VideoStatus::Processing;
        self.updated_at = Utc::now();
        self
    }

    /// Mark as processed with the output location.
    pub fn mark_processed(mut self, processed_url: impl Into<String>, duration_secs: f64) -> Self {
        self.status = VideoStatus::Processed;
        self.processed_url = Some(processed_url.into());
        self.duration_secs = duration_secs;
        self.updated_at = Utc::now();
        self
    }

    /// Mark as failed.
    pub fn mark_failed(mut self, error: impl Into<String>) -> Self {
        self.status = VideoStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self
    }

    /// Mark as cancelled.
    pub fn mark_cancelled(mut self) -> Self {
        self.status = VideoStatus::Cancelled;
        self.updated_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_generation() {
        let id1 = VideoId::new();
        let id2 = VideoId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_record_lifecycle() {
        let rec = VideoRecord::new_uploaded(
            VideoId::new(),
            OrgId::from("org_1"),
            "Launch teaser",
            "file:///tmp/raw.mp4",
        );
        assert_eq!(rec.status, VideoStatus::Uploaded);

        let rec = rec.mark_processing();
        assert_eq!(rec.status, VideoStatus::Processing);

        let rec = rec.mark_processed("file:///tmp/out.mp4", 12.0);
        assert_eq!(rec.status, VideoStatus::Processed);
        assert_eq!(rec.processed_url.as_deref(), Some("file:///tmp/out.mp4"));
        assert!((rec.duration_secs - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_collectable_statuses() {
        assert!(VideoStatus::Failed.is_collectable());
        assert!(VideoStatus::Cancelled.is_collectable());
        assert!(!VideoStatus::Ready.is_collectable());
        assert!(!VideoStatus::Processing.is_collectable());
    }
}
