//! Beat clock for periodic jobs.
//!
//! Every schedule lives in this one table; the wall-clock zone is UTC.
//! The beat only enqueues; the jobs themselves run on the maintenance
//! queue like any other work.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use reelkit_queue::{CleanupVideosJob, JobQueue, QueueError, QueueJob};

/// One periodic schedule.
pub struct BeatEntry {
    pub name: &'static str,
    pub interval: Duration,
    pub build: fn() -> QueueJob,
}

/// All periodic schedules (UTC).
pub fn schedule() -> Vec<BeatEntry> {
    vec![BeatEntry {
        name: "cleanup_videos_hourly",
        interval: Duration::from_secs(3600),
        build: || QueueJob::CleanupVideos(CleanupVideosJob::new()),
    }]
}

/// Run the beat until shutdown. Each entry ticks on its own task; the
/// first tick fires one interval after start, not immediately.
pub async fn run(queue: Arc<JobQueue>, shutdown: watch::Receiver<bool>) {
    let entries = schedule();
    info!(entries = entries.len(), "Beat clock started (UTC)");

    let mut handles = Vec::with_capacity(entries.len());
    for entry in entries {
        let queue = Arc::clone(&queue);
        let mut shutdown = shutdown.clone();

        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(entry.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Swallow the immediate first tick.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!(schedule = entry.name, "Beat entry stopping");
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        let job = (entry.build)();
                        match queue.enqueue(&job).await {
                            Ok(job_id) => {
                                info!(schedule = entry.name, job_id = %job_id, "Beat enqueued job");
                            }
                            // A previous beat's job still in its dedup
                            // window is normal when multiple workers
                            // carry the clock.
                            Err(QueueError::Duplicate(_)) => {}
                            Err(e) => {
                                warn!(schedule = entry.name, error = %e, "Beat enqueue failed");
                            }
                        }
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.await.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_has_hourly_cleanup() {
        let entries = schedule();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "cleanup_videos_hourly");
        assert_eq!(entries[0].interval, Duration::from_secs(3600));

        let job = (entries[0].build)();
        assert!(matches!(job, QueueJob::CleanupVideos(_)));
        assert_eq!(job.queue_name(), reelkit_queue::QUEUE_MAINTENANCE);
    }
}
