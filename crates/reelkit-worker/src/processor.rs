//! Job processors.
//!
//! Each processor turns a queue payload into a result value for the
//! status backend. Video processing streams stage progress into the
//! status store and honours revocation between stages.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use reelkit_ai::adapters::avatar::AvatarClient;
use reelkit_core::stores::blob_keys;
use reelkit_core::{BlobStore, VideoStore};
use reelkit_media::fs_utils::remove_quiet;
use reelkit_models::{JobId, VideoRecord};
use reelkit_queue::{
    AvatarRenderJob, CleanupVideosJob, JobQueue, JobStatusStore, ProcessVideoJob, QueueJob,
};

use crate::cleanup::collect_stale_videos;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Shared dependencies for all processors.
pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub queue: Arc<JobQueue>,
    pub status: JobStatusStore,
    pub videos: Arc<dyn VideoStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub avatar: Option<AvatarClient>,
}

impl ProcessingContext {
    /// Poll the revocation marker and flip the cancel watch when set.
    /// The returned handle is aborted when processing ends.
    fn spawn_revocation_watch(
        &self,
        job_id: JobId,
    ) -> (watch::Receiver<bool>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = watch::channel(false);
        let queue = Arc::clone(&self.queue);
        let poll = self.config.revoke_poll_interval;

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll).await;
                match queue.is_revoked(&job_id).await {
                    Ok(true) => {
                        info!(job_id = %job_id, "Revocation observed, cancelling job");
                        tx.send(true).ok();
                        return;
                    }
                    Ok(false) => {}
                    Err(e) => warn!(job_id = %job_id, error = %e, "Revocation poll failed"),
                }
                if tx.is_closed() {
                    return;
                }
            }
        });

        (rx, handle)
    }
}

/// Dispatch one job to its processor. `attempts` counts this run.
pub async fn process_job(
    ctx: &Arc<ProcessingContext>,
    job: &QueueJob,
    attempts: u32,
) -> WorkerResult<Value> {
    match job {
        QueueJob::ProcessVideo(j) => process_video(ctx, j, attempts).await,
        QueueJob::AvatarRender(j) => avatar_render(ctx, j).await,
        QueueJob::CleanupVideos(j) => cleanup_videos(ctx, j).await,
    }
}

/// Run the media pipeline for one video and persist the result.
async fn process_video(
    ctx: &Arc<ProcessingContext>,
    job: &ProcessVideoJob,
    attempts: u32,
) -> WorkerResult<Value> {
    let logger = JobLogger::new(&job.job_id, "video.process");
    logger.log_start("Starting video processing");

    let record = ctx.videos.get(&job.org_id, &job.video_id).await?;
    if let Some(record) = record.clone() {
        ctx.videos.upsert(record.mark_processing()).await?;
    }

    ctx.status
        .set_progress(&job.job_id, 0, 100, "Starting video processing", attempts)
        .await?;

    let (cancel_rx, revocation_handle) = ctx.spawn_revocation_watch(job.job_id.clone());

    // The pipeline's progress callback is synchronous; stage updates are
    // relayed through a channel onto the async status store.
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(u8, String)>();
    let status = ctx.status.clone();
    let progress_job_id = job.job_id.clone();
    let progress_handle = tokio::spawn(async move {
        while let Some((percent, text)) = progress_rx.recv().await {
            status
                .set_progress(&progress_job_id, percent as u32, 100, text, attempts)
                .await
                .ok();
        }
    });

    let work_dir = PathBuf::from(&ctx.config.work_dir).join(job.video_id.as_str());
    let pipeline_result = reelkit_media::process_video(
        &job.video_url,
        &job.video_id,
        &job.options,
        &work_dir,
        |percent, text| {
            progress_tx.send((percent, text.to_string())).ok();
        },
        Some(cancel_rx),
    )
    .await;

    revocation_handle.abort();
    drop(progress_tx);
    progress_handle.await.ok();

    let output = match pipeline_result {
        Ok(output) => output,
        Err(e) => {
            if !matches!(e, reelkit_media::MediaError::Cancelled) {
                if let Some(record) = record {
                    ctx.videos
                        .upsert(record.mark_failed(e.to_string()))
                        .await
                        .ok();
                }
            } else if let Some(record) = record {
                ctx.videos.upsert(record.mark_cancelled()).await.ok();
            }
            logger.log_error(&e.to_string());
            return Err(e.into());
        }
    };

    let key = blob_keys::processed(&job.org_id, &job.video_id);
    let processed_url = ctx
        .blobs
        .put(&key, &output.output_path, "video/mp4")
        .await?;
    remove_quiet(&output.output_path).await;

    let record = match ctx.videos.get(&job.org_id, &job.video_id).await? {
        Some(record) => record,
        // Redelivery after a row wipe: recreate so the result is not lost.
        None => VideoRecord::new_uploaded(
            job.video_id.clone(),
            job.org_id.clone(),
            job.video_id.as_str(),
            job.video_url.clone(),
        ),
    };
    ctx.videos
        .upsert(record.mark_processed(processed_url.clone(), output.duration))
        .await?;

    logger.log_completion(&format!(
        "Processed video stored at {processed_url} ({:.1}s)",
        output.duration
    ));
    metrics::counter!("reelkit_jobs_total", "task" => "video.process", "outcome" => "success")
        .increment(1);

    Ok(json!({
        "video_id": job.video_id,
        "processed_url": processed_url,
        "duration": output.duration,
        "size_bytes": output.size_bytes,
    }))
}

/// Launch an avatar render; completion arrives via webhook.
async fn avatar_render(ctx: &Arc<ProcessingContext>, job: &AvatarRenderJob) -> WorkerResult<Value> {
    let logger = JobLogger::new(&job.job_id, "avatar.render");
    logger.log_start("Launching avatar render");

    let Some(avatar) = &ctx.avatar else {
        return Err(WorkerError::config_error(
            "avatar vendor not configured for this worker",
        ));
    };

    let launched = avatar
        .create_video(&job.script, &job.avatar_id, &job.voice_id)
        .await?;

    logger.log_completion(&format!("Vendor job {}", launched.external_job_id));
    metrics::counter!("reelkit_jobs_total", "task" => "avatar.render", "outcome" => "success")
        .increment(1);

    Ok(json!({
        "external_job_id": launched.external_job_id,
        "status": launched.status,
    }))
}

/// Hourly GC of collectable videos.
async fn cleanup_videos(
    ctx: &Arc<ProcessingContext>,
    job: &CleanupVideosJob,
) -> WorkerResult<Value> {
    let logger = JobLogger::new(&job.job_id, "maintenance.cleanup_videos");
    logger.log_start("Collecting stale videos");

    let removed = collect_stale_videos(&ctx.videos, &ctx.blobs, job.max_age_days).await?;

    logger.log_completion(&format!("Removed {removed} videos"));
    Ok(json!({"removed": removed}))
}
