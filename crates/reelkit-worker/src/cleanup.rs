//! Video garbage collection.
//!
//! Removes videos stuck in `failed`/`cancelled` older than the age
//! threshold, together with their blobs. Runs hourly from the beat
//! schedule.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use reelkit_core::{BlobStore, VideoStore};
use reelkit_models::VideoStatus;

use crate::error::WorkerResult;

/// Delete collectable videos older than `max_age_days`. Returns how many
/// rows were removed.
pub async fn collect_stale_videos(
    video_store: &Arc<dyn VideoStore>,
    blob_store: &Arc<dyn BlobStore>,
    max_age_days: i64,
) -> WorkerResult<u64> {
    let cutoff = Utc::now() - Duration::days(max_age_days);
    let stale = video_store
        .list_stale(&[VideoStatus::Failed, VideoStatus::Cancelled], cutoff)
        .await?;

    let mut removed = 0u64;
    for video in stale {
        // Blob deletes are best-effort; a dangling blob is preferable to
        // a row that never goes away.
        if let Err(e) = blob_store.delete(&video.source_url).await {
            warn!(video_id = %video.id, error = %e, "Failed to delete source blob");
        }
        if let Some(processed) = &video.processed_url {
            if let Err(e) = blob_store.delete(processed).await {
                warn!(video_id = %video.id, error = %e, "Failed to delete processed blob");
            }
        }

        video_store.delete(&video.org_id, &video.id).await?;
        removed += 1;
        info!(
            video_id = %video.id,
            org_id = %video.org_id,
            status = %video.status,
            "Collected stale video"
        );
    }

    if removed > 0 {
        metrics::counter!("reelkit_videos_collected_total").increment(removed);
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelkit_core::stores::blob_keys;
    use reelkit_core::{FsBlobStore, MemoryVideoStore};
    use reelkit_models::{OrgId, VideoId, VideoRecord};

    async fn seeded_video(
        videos: &Arc<dyn VideoStore>,
        blobs: &Arc<dyn BlobStore>,
        dir: &std::path::Path,
        status: VideoStatus,
        age_days: i64,
    ) -> VideoId {
        let id = VideoId::new();
        let org = OrgId::from("org_1");

        let local = dir.join(format!("{id}.mp4"));
        tokio::fs::write(&local, b"video bytes").await.unwrap();
        let url = blobs
            .put(&blob_keys::raw(&org, &id, "mp4"), &local, "video/mp4")
            .await
            .unwrap();

        let mut record = VideoRecord::new_uploaded(id.clone(), org, "clip", url);
        record.status = status;
        record.updated_at = Utc::now() - Duration::days(age_days);
        videos.upsert(record).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_collects_old_failed_and_keeps_recent() {
        let dir = tempfile::tempdir().unwrap();
        let videos: Arc<dyn VideoStore> = MemoryVideoStore::new();
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(dir.path()));
        let org = OrgId::from("org_1");

        let old_a = seeded_video(&videos, &blobs, dir.path(), VideoStatus::Failed, 8).await;
        let old_b = seeded_video(&videos, &blobs, dir.path(), VideoStatus::Cancelled, 9).await;
        let recent = seeded_video(&videos, &blobs, dir.path(), VideoStatus::Failed, 3).await;
        let healthy = seeded_video(&videos, &blobs, dir.path(), VideoStatus::Ready, 30).await;

        let removed = collect_stale_videos(&videos, &blobs, 7).await.unwrap();
        assert_eq!(removed, 2);

        assert!(videos.get(&org, &old_a).await.unwrap().is_none());
        assert!(videos.get(&org, &old_b).await.unwrap().is_none());
        assert!(videos.get(&org, &recent).await.unwrap().is_some());
        assert!(videos.get(&org, &healthy).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_blobs_removed_with_rows() {
        let dir = tempfile::tempdir().unwrap();
        let videos: Arc<dyn VideoStore> = MemoryVideoStore::new();
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(dir.path()));
        let org = OrgId::from("org_1");

        let id = seeded_video(&videos, &blobs, dir.path(), VideoStatus::Failed, 10).await;
        let url = videos.get(&org, &id).await.unwrap().unwrap().source_url;
        assert!(blobs.exists(&url).await.unwrap());

        collect_stale_videos(&videos, &blobs, 7).await.unwrap();
        assert!(!blobs.exists(&url).await.unwrap());
    }
}
