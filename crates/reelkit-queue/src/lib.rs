//! Redis Streams job queue and result backend.
//!
//! This crate provides:
//! - Job enqueueing with idempotent dedup and per-queue routing
//! - Worker consumption with late acks, crash reclaim and a DLQ
//! - Delayed retries with exponential backoff and jitter
//! - Revocation markers for caller-side cancellation
//! - The canonical job status store with monotonic terminal states
//! - Live status snapshots via Pub/Sub

pub mod error;
pub mod job;
pub mod progress;
pub mod queue;
pub mod status;

pub use error::{QueueError, QueueResult};
pub use job::{
    AvatarRenderJob, CleanupVideosJob, ProcessVideoJob, QueueJob, QUEUE_AVATAR, QUEUE_MAINTENANCE,
    QUEUE_VIDEO,
};
pub use progress::ProgressChannel;
pub use queue::{JobQueue, QueueConfig, QueueInspection};
pub use status::{JobStatusStore, RESULT_TTL_SECS};
