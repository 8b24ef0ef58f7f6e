//! Job queue over Redis Streams.
//!
//! One stream and consumer group per logical queue (`video`, `avatar`,
//! `maintenance`). Acks are late: a message stays pending until the worker
//! finishes, so a crashed worker's job is reclaimed by `claim_pending`.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use reelkit_models::JobId;

use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// First retry delay; doubles per attempt.
const RETRY_BASE_SECS: u64 = 60;

/// Backoff ceiling.
const RETRY_CAP_SECS: u64 = 600;

/// Jitter applied to a computed backoff, as a fraction.
const RETRY_JITTER: f64 = 0.25;

/// Dedup and revocation markers expire after this long.
const MARKER_TTL_SECS: u64 = 3600;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Prefix for stream and marker keys
    pub namespace: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Max attempts before the DLQ (first run included)
    pub max_attempts: u32,
    /// Messages consumed per read; 1 keeps fairness strict under
    /// heterogeneous task durations
    pub prefetch: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            namespace: "reelkit".to_string(),
            consumer_group: "reelkit:workers".to_string(),
            max_attempts: 3,
            prefetch: 1,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("QUEUE_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            namespace: std::env::var("QUEUE_NAMESPACE").unwrap_or_else(|_| "reelkit".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "reelkit:workers".to_string()),
            max_attempts: std::env::var("QUEUE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            prefetch: 1,
        }
    }
}

/// Per-queue occupancy snapshot from `inspect`.
#[derive(Debug, Clone, Default)]
pub struct QueueInspection {
    /// Messages delivered to a consumer and not yet acked
    pub active: u64,
    /// Delayed retries waiting for their ETA
    pub scheduled: u64,
    /// Messages on the stream not yet delivered
    pub reserved: u64,
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn prefetch(&self) -> usize {
        self.config.prefetch
    }

    fn stream_key(&self, queue: &str) -> String {
        format!("{}:jobs:{queue}", self.config.namespace)
    }

    fn dlq_key(&self, queue: &str) -> String {
        format!("{}:dlq:{queue}", self.config.namespace)
    }

    fn delayed_key(&self, queue: &str) -> String {
        format!("{}:delayed:{queue}", self.config.namespace)
    }

    fn dedup_key(&self, idempotency_key: &str) -> String {
        format!("{}:dedup:{idempotency_key}", self.config.namespace)
    }

    fn revoked_key(&self, job_id: &JobId) -> String {
        format!("{}:revoked:{job_id}", self.config.namespace)
    }

    fn attempts_key(&self, job_id: &JobId) -> String {
        format!("{}:attempts:{job_id}", self.config.namespace)
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Create the consumer group on every queue stream.
    pub async fn init(&self, queues: &[&str]) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        for queue in queues {
            let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(self.stream_key(queue))
                .arg(&self.config.consumer_group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            match result {
                Ok(()) => info!(queue, "Created consumer group"),
                Err(e) if e.to_string().contains("BUSYGROUP") => {
                    debug!(queue, "Consumer group already exists");
                }
                Err(e) => return Err(QueueError::Redis(e)),
            }
        }

        Ok(())
    }

    /// Enqueue a job onto its queue. Duplicate submissions inside the
    /// dedup window are rejected.
    pub async fn enqueue(&self, job: &QueueJob) -> QueueResult<JobId> {
        let mut conn = self.conn().await?;

        let dedup_key = self.dedup_key(&job.idempotency_key());
        let fresh: bool = redis::cmd("SET")
            .arg(&dedup_key)
            .arg(job.job_id().as_str())
            .arg("NX")
            .arg("EX")
            .arg(MARKER_TTL_SECS)
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();

        if !fresh {
            warn!(key = %job.idempotency_key(), "Duplicate job rejected");
            return Err(QueueError::Duplicate(job.idempotency_key()));
        }

        let message_id = self.push_to_stream(&mut conn, job).await?;

        info!(
            job_id = %job.job_id(),
            queue = job.queue_name(),
            message_id = %message_id,
            "Enqueued job"
        );

        Ok(job.job_id().clone())
    }

    async fn push_to_stream(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        job: &QueueJob,
    ) -> QueueResult<String> {
        let payload = serde_json::to_string(job)?;

        let message_id: String = redis::cmd("XADD")
            .arg(self.stream_key(job.queue_name()))
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(conn)
            .await?;

        Ok(message_id)
    }

    /// Consume up to `prefetch` jobs from `queue`, blocking for `block_ms`.
    pub async fn consume(
        &self,
        queue: &str,
        consumer_name: &str,
        block_ms: u64,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.conn().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(self.config.prefetch)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(self.stream_key(queue))
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream_key in result.keys {
            for entry in stream_key.ids {
                if let Some(job) = self.parse_entry(queue, &entry).await {
                    jobs.push((entry.id.clone(), job));
                }
            }
        }

        Ok(jobs)
    }

    async fn parse_entry(&self, queue: &str, entry: &redis::streams::StreamId) -> Option<QueueJob> {
        let redis::Value::BulkString(payload) = entry.map.get("job")? else {
            return None;
        };

        match serde_json::from_slice::<QueueJob>(payload) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(message_id = %entry.id, error = %e, "Unparsable job payload, dropping");
                self.ack(queue, &entry.id).await.ok();
                None
            }
        }
    }

    /// Acknowledge and delete a finished message.
    pub async fn ack(&self, queue: &str, message_id: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let stream = self.stream_key(queue);

        redis::cmd("XACK")
            .arg(&stream)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("XDEL")
            .arg(&stream)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!(queue, message_id, "Acknowledged message");
        Ok(())
    }

    /// Claim messages another consumer left pending for at least
    /// `min_idle` (crashed-worker redelivery).
    pub async fn claim_pending(
        &self,
        queue: &str,
        consumer_name: &str,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.conn().await?;

        let result: redis::streams::StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(self.stream_key(queue))
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for entry in result.claimed {
            if let Some(job) = self.parse_entry(queue, &entry).await {
                info!(job_id = %job.job_id(), queue, "Claimed pending job");
                jobs.push((entry.id.clone(), job));
            }
        }

        Ok(jobs)
    }

    /// Record one more attempt for a job, returning the new total
    /// (first run returns 1).
    pub async fn record_attempt(&self, job_id: &JobId) -> QueueResult<u32> {
        let mut conn = self.conn().await?;
        let key = self.attempts_key(job_id);

        let attempts: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, 86_400).await?;
        Ok(attempts)
    }

    /// Backoff before attempt `attempt + 1`: exponential from 60 s,
    /// capped at 600 s, with ±25 % jitter.
    pub fn retry_delay(attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let base = (RETRY_BASE_SECS.saturating_mul(1 << exp)).min(RETRY_CAP_SECS) as f64;

        let jitter = rand::thread_rng().gen_range(-RETRY_JITTER..=RETRY_JITTER);
        Duration::from_secs_f64(base * (1.0 + jitter))
    }

    /// Park a failed job on the delayed set; `promote_due` moves it back
    /// onto its stream once the ETA passes. Returns the ETA.
    pub async fn schedule_retry(
        &self,
        job: &QueueJob,
        attempt: u32,
    ) -> QueueResult<chrono::DateTime<chrono::Utc>> {
        let mut conn = self.conn().await?;

        let delay = Self::retry_delay(attempt);
        let eta = chrono::Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        let payload = serde_json::to_string(job)?;

        conn.zadd::<_, _, _, ()>(self.delayed_key(job.queue_name()), payload, eta.timestamp())
            .await?;

        info!(
            job_id = %job.job_id(),
            attempt,
            delay_secs = delay.as_secs(),
            "Scheduled retry"
        );

        Ok(eta)
    }

    /// Move due delayed jobs back onto their streams. Returns how many
    /// were promoted.
    pub async fn promote_due(&self, queue: &str) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let delayed = self.delayed_key(queue);
        let now = chrono::Utc::now().timestamp();

        let due: Vec<String> = conn.zrangebyscore(&delayed, 0, now).await?;
        if due.is_empty() {
            return Ok(0);
        }

        let mut promoted = 0u64;
        for payload in due {
            let job: QueueJob = match serde_json::from_str(&payload) {
                Ok(j) => j,
                Err(e) => {
                    warn!(error = %e, "Unparsable delayed payload, dropping");
                    conn.zrem::<_, _, ()>(&delayed, &payload).await?;
                    continue;
                }
            };

            // Remove first so a concurrent promoter cannot double-enqueue.
            let removed: u64 = conn.zrem(&delayed, &payload).await?;
            if removed == 0 {
                continue;
            }

            self.push_to_stream(&mut conn, &job).await?;
            promoted += 1;
            debug!(job_id = %job.job_id(), queue, "Promoted delayed job");
        }

        Ok(promoted)
    }

    /// Move a permanently failed message to the queue's DLQ stream.
    pub async fn dlq(
        &self,
        queue: &str,
        message_id: &str,
        job: &QueueJob,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(job)?;

        redis::cmd("XADD")
            .arg(self.dlq_key(queue))
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(queue, message_id).await?;

        warn!(job_id = %job.job_id(), queue, error, "Moved job to DLQ");
        Ok(())
    }

    /// Clear a job's dedup marker so the same work can be submitted again.
    pub async fn clear_dedup(&self, job: &QueueJob) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(self.dedup_key(&job.idempotency_key()))
            .await?;
        Ok(())
    }

    /// Mark a job revoked. Executing workers poll `is_revoked` and stop
    /// at the next cancellation point.
    pub async fn revoke(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(self.revoked_key(job_id), "1", MARKER_TTL_SECS)
            .await?;
        info!(job_id = %job_id, "Job revoked");
        Ok(())
    }

    pub async fn is_revoked(&self, job_id: &JobId) -> QueueResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(self.revoked_key(job_id)).await?)
    }

    /// Occupancy per queue: active (delivered, unacked), scheduled
    /// (delayed retries), reserved (stream backlog).
    pub async fn inspect(&self, queues: &[&str]) -> QueueResult<HashMap<String, QueueInspection>> {
        let mut conn = self.conn().await?;
        let mut report = HashMap::new();

        for queue in queues {
            let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
                .arg(self.stream_key(queue))
                .arg(&self.config.consumer_group)
                .query_async(&mut conn)
                .await
                .unwrap_or(redis::streams::StreamPendingReply::Empty);

            let active = pending.count() as u64;
            let scheduled: u64 = conn.zcard(self.delayed_key(queue)).await.unwrap_or(0);
            let total: u64 = conn.xlen(self.stream_key(queue)).await.unwrap_or(0);

            report.insert(
                queue.to_string(),
                QueueInspection {
                    active,
                    scheduled,
                    reserved: total.saturating_sub(active),
                },
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CleanupVideosJob, ProcessVideoJob, QUEUE_VIDEO};
    use reelkit_media::ProcessOptions;
    use reelkit_models::{OrgId, VideoId};

    #[test]
    fn test_retry_delay_backoff_and_cap() {
        // attempt 1 -> ~60s, attempt 2 -> ~120s, attempt 5+ -> capped ~600s
        for (attempt, base) in [(1u32, 60.0f64), (2, 120.0), (3, 240.0), (4, 480.0), (5, 600.0), (9, 600.0)] {
            let delay = JobQueue::retry_delay(attempt).as_secs_f64();
            assert!(
                delay >= base * 0.75 - 1e-6 && delay <= base * 1.25 + 1e-6,
                "attempt {attempt}: {delay} outside jitter window of {base}"
            );
        }
    }

    #[test]
    fn test_key_namespacing() {
        let queue = JobQueue::new(QueueConfig::default()).unwrap();
        assert_eq!(queue.stream_key(QUEUE_VIDEO), "reelkit:jobs:video");
        assert_eq!(queue.delayed_key(QUEUE_VIDEO), "reelkit:delayed:video");
        assert_eq!(queue.dlq_key(QUEUE_VIDEO), "reelkit:dlq:video");
    }

    fn sample_job() -> QueueJob {
        QueueJob::ProcessVideo(ProcessVideoJob::new(
            OrgId::from("org_1"),
            VideoId::new(),
            "file:///tmp/raw.mp4",
            ProcessOptions::default(),
        ))
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_enqueue_consume_ack() {
        dotenvy::dotenv().ok();
        let queue = JobQueue::from_env().unwrap();
        queue.init(&[QUEUE_VIDEO]).await.unwrap();

        let job = sample_job();
        queue.enqueue(&job).await.unwrap();

        let consumed = queue.consume(QUEUE_VIDEO, "test-consumer", 1000).await.unwrap();
        assert_eq!(consumed.len(), 1);
        assert_eq!(consumed[0].1.job_id(), job.job_id());

        queue.ack(QUEUE_VIDEO, &consumed[0].0).await.unwrap();
        queue.clear_dedup(&job).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_duplicate_enqueue_rejected() {
        dotenvy::dotenv().ok();
        let queue = JobQueue::from_env().unwrap();
        queue.init(&[QUEUE_VIDEO]).await.unwrap();

        let job = sample_job();
        queue.enqueue(&job).await.unwrap();
        let err = queue.enqueue(&job).await.unwrap_err();
        assert!(matches!(err, QueueError::Duplicate(_)));

        queue.clear_dedup(&job).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_revocation_marker() {
        dotenvy::dotenv().ok();
        let queue = JobQueue::from_env().unwrap();

        let job = QueueJob::CleanupVideos(CleanupVideosJob::new());
        assert!(!queue.is_revoked(job.job_id()).await.unwrap());
        queue.revoke(job.job_id()).await.unwrap();
        assert!(queue.is_revoked(job.job_id()).await.unwrap());
    }
}
