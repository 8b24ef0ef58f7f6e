//! Job payloads carried on the queue.
//!
//! Payloads are JSON end to end; arbitrary object graphs are forbidden in
//! arguments and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reelkit_media::ProcessOptions;
use reelkit_models::{JobId, OrgId, VideoId};

/// Queue a processing job routes to.
pub const QUEUE_VIDEO: &str = "video";
pub const QUEUE_AVATAR: &str = "avatar";
pub const QUEUE_MAINTENANCE: &str = "maintenance";

/// Job to run the full processing pipeline over a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Owning organization
    pub org_id: OrgId,
    /// Video row the result is written to
    pub video_id: VideoId,
    /// Source blob URL
    pub video_url: String,
    /// Pipeline stages to run
    pub options: ProcessOptions,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl ProcessVideoJob {
    pub fn new(
        org_id: OrgId,
        video_id: VideoId,
        video_url: impl Into<String>,
        options: ProcessOptions,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            org_id,
            video_id,
            video_url: video_url.into(),
            options,
            created_at: Utc::now(),
        }
    }

    /// Keyed by org and video so a redelivery overwrites the same row.
    pub fn idempotency_key(&self) -> String {
        format!("process:{}:{}", self.org_id, self.video_id)
    }
}

/// Job to render an avatar video through the external vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarRenderJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Owning organization
    pub org_id: OrgId,
    /// Script the avatar reads
    pub script: String,
    /// Vendor avatar identifier
    pub avatar_id: String,
    /// Vendor voice identifier
    pub voice_id: String,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl AvatarRenderJob {
    pub fn new(
        org_id: OrgId,
        script: impl Into<String>,
        avatar_id: impl Into<String>,
        voice_id: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            org_id,
            script: script.into(),
            avatar_id: avatar_id.into(),
            voice_id: voice_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("avatar:{}:{}", self.org_id, self.job_id)
    }
}

/// Periodic job: GC videos stuck in failed/cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupVideosJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Age threshold in days for collectable videos
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

fn default_max_age_days() -> i64 {
    7
}

impl CleanupVideosJob {
    pub fn new() -> Self {
        Self {
            job_id: JobId::new(),
            max_age_days: default_max_age_days(),
            created_at: Utc::now(),
        }
    }

    pub fn idempotency_key(&self) -> String {
        format!("cleanup:{}", self.job_id)
    }
}

impl Default for CleanupVideosJob {
    fn default() -> Self {
        Self::new()
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    ProcessVideo(ProcessVideoJob),
    AvatarRender(AvatarRenderJob),
    CleanupVideos(CleanupVideosJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::ProcessVideo(j) => &j.job_id,
            QueueJob::AvatarRender(j) => &j.job_id,
            QueueJob::CleanupVideos(j) => &j.job_id,
        }
    }

    pub fn org_id(&self) -> Option<&OrgId> {
        match self {
            QueueJob::ProcessVideo(j) => Some(&j.org_id),
            QueueJob::AvatarRender(j) => Some(&j.org_id),
            QueueJob::CleanupVideos(_) => None,
        }
    }

    /// Queue this job routes to (`video.*` work stays on the video queue).
    pub fn queue_name(&self) -> &'static str {
        match self {
            QueueJob::ProcessVideo(_) => QUEUE_VIDEO,
            QueueJob::AvatarRender(_) => QUEUE_AVATAR,
            QueueJob::CleanupVideos(_) => QUEUE_MAINTENANCE,
        }
    }

    pub fn task_name(&self) -> &'static str {
        match self {
            QueueJob::ProcessVideo(_) => "video.process",
            QueueJob::AvatarRender(_) => "avatar.render",
            QueueJob::CleanupVideos(_) => "maintenance.cleanup_videos",
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::ProcessVideo(j) => j.idempotency_key(),
            QueueJob::AvatarRender(j) => j.idempotency_key(),
            QueueJob::CleanupVideos(j) => j.idempotency_key(),
        }
    }
}
