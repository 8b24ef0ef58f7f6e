//! Shared data models for the ReelKit backend.
//!
//! This crate provides Serde-serializable types for:
//! - Organization-scoped videos and their lifecycle
//! - Queue jobs and job status reporting
//! - Transcriptions, silence intervals and subtitle styles
//! - Assistant chat turns and tool calls
//! - Social platform character limits

pub mod assistant;
pub mod job;
pub mod platform;
pub mod silence;
pub mod subtitle;
pub mod transcript;
pub mod video;

// Re-export common types
pub use assistant::{ChatResponse, ChatRole, ChatTurn, ToolCall};
pub use job::{JobId, JobProgress, JobState, JobStatus};
pub use platform::{Platform, PlatformDescription};
pub use silence::{SilenceDetection, SilenceInterval};
pub use subtitle::{HexColor, SubtitlePosition, SubtitlePreset, SubtitleStyle};
pub use transcript::{TranscriptSegment, TranscriptionProvider, TranscriptionResult};
pub use video::{OrgId, VideoId, VideoRecord, VideoStatus, VideoTechMetadata};
