//! Live status mirroring via Redis Pub/Sub.
//!
//! Every status write is published on `progress:{job_id}` so observers
//! (websockets, CLIs) can follow a job without polling the status store.

use redis::AsyncCommands;
use tracing::debug;

use reelkit_models::{JobId, JobStatus};

use crate::error::QueueResult;

/// Publishes and subscribes to per-job status snapshots.
#[derive(Clone)]
pub struct ProgressChannel {
    client: redis::Client,
}

impl ProgressChannel {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }

    pub fn channel_name(job_id: &JobId) -> String {
        format!("progress:{job_id}")
    }

    /// Publish a status snapshot.
    pub async fn publish(&self, status: &JobStatus) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(&status.job_id);
        let payload = serde_json::to_string(status)?;

        debug!(channel = %channel, state = %status.state, "Publishing status");
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    /// Subscribe to a job's snapshots. Returns a pinned stream polled
    /// with `.next()`.
    pub async fn subscribe(
        &self,
        job_id: &JobId,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures_util::Stream<Item = JobStatus> + Send>>> {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(Self::channel_name(job_id)).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name() {
        let job_id = JobId::from("j-1");
        assert_eq!(ProgressChannel::channel_name(&job_id), "progress:j-1");
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_publish_subscribe_roundtrip() {
        use futures_util::StreamExt;
        use reelkit_models::JobState;

        dotenvy::dotenv().ok();
        let url =
            std::env::var("QUEUE_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let channel = ProgressChannel::new(&url).unwrap();
        let job_id = JobId::new();

        let mut stream = channel.subscribe(&job_id).await.unwrap();

        let mut status = JobStatus::pending(job_id.clone());
        status.state = JobState::Progress;
        channel.publish(&status).await.unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.state, JobState::Progress);
        assert_eq!(received.job_id, job_id);
    }
}
