//! Contracts for the persistence collaborators.
//!
//! The relational store and the object store are owned by the organization
//! layer; the core only needs the operations below. `MemoryVideoStore` and
//! `FsBlobStore` implement them for local runs and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use reelkit_models::{OrgId, VideoId, VideoRecord, VideoStatus};

use crate::error::{CoreError, CoreResult};

/// Video row operations the core issues. Writes are keyed by video id;
/// redelivered jobs overwrite the same row.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Fetch a video. Cross-tenant ids resolve to `None`.
    async fn get(&self, org_id: &OrgId, video_id: &VideoId) -> CoreResult<Option<VideoRecord>>;

    /// Insert or replace a video row.
    async fn upsert(&self, record: VideoRecord) -> CoreResult<()>;

    /// Videos in any of `statuses` last updated before `cutoff`.
    async fn list_stale(
        &self,
        statuses: &[VideoStatus],
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<VideoRecord>>;

    /// Delete a video row.
    async fn delete(&self, org_id: &OrgId, video_id: &VideoId) -> CoreResult<()>;
}

/// Blob operations the core issues.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a local file under `key`, returning its URL.
    async fn put(&self, key: &str, local_path: &Path, content_type: &str) -> CoreResult<String>;

    /// Delete a blob by URL. Unknown URLs are a no-op.
    async fn delete(&self, url: &str) -> CoreResult<()>;

    /// Whether a blob exists at `url`.
    async fn exists(&self, url: &str) -> CoreResult<bool>;
}

/// Key layout for the two buckets.
pub mod blob_keys {
    use reelkit_models::{OrgId, VideoId};

    pub fn raw(org_id: &OrgId, video_id: &VideoId, ext: &str) -> String {
        format!("videos-raw/{org_id}/{video_id}.{ext}")
    }

    pub fn processed(org_id: &OrgId, video_id: &VideoId) -> String {
        format!("videos-processed/{org_id}/processed/{video_id}.mp4")
    }
}

/// In-process video store for local runs and tests.
#[derive(Default)]
pub struct MemoryVideoStore {
    rows: RwLock<HashMap<(String, String), VideoRecord>>,
}

impl MemoryVideoStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn get(&self, org_id: &OrgId, video_id: &VideoId) -> CoreResult<Option<VideoRecord>> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&(org_id.to_string(), video_id.to_string()))
            .cloned())
    }

    async fn upsert(&self, record: VideoRecord) -> CoreResult<()> {
        let mut rows = self.rows.write().await;
        rows.insert(
            (record.org_id.to_string(), record.id.to_string()),
            record,
        );
        Ok(())
    }

    async fn list_stale(
        &self,
        statuses: &[VideoStatus],
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<VideoRecord>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|r| statuses.contains(&r.status) && r.updated_at < cutoff)
            .cloned()
            .collect())
    }

    async fn delete(&self, org_id: &OrgId, video_id: &VideoId) -> CoreResult<()> {
        let mut rows = self.rows.write().await;
        rows.remove(&(org_id.to_string(), video_id.to_string()));
        Ok(())
    }
}

/// Blob store over a local directory, serving `file://` URLs.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("BLOB_ROOT").unwrap_or_else(|_| "/tmp/reelkit-blobs".to_string());
        Self::new(root)
    }

    fn path_for_url<'a>(&self, url: &'a str) -> Option<PathBuf> {
        url.strip_prefix("file://").map(PathBuf::from)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, local_path: &Path, _content_type: &str) -> CoreResult<String> {
        let dest = self.root.join(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &dest).await?;

        debug!(key = %key, dest = %dest.display(), "Stored blob");
        Ok(format!("file://{}", dest.display()))
    }

    async fn delete(&self, url: &str) -> CoreResult<()> {
        let Some(path) = self.path_for_url(url) else {
            return Err(CoreError::validation(format!("not a file:// URL: {url}")));
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, url: &str) -> CoreResult<bool> {
        let Some(path) = self.path_for_url(url) else {
            return Ok(false);
        };
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }
}
