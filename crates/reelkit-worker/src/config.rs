//! Worker configuration.

use std::time::Duration;

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queues this worker consumes, in priority order
    pub queues: Vec<String>,
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Tasks processed before the worker recycles itself
    pub max_tasks_per_worker: u64,
    /// Work directory for temporary files
    pub work_dir: String,
    /// How often to scan for orphaned pending jobs and due retries
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be reclaimed
    pub claim_min_idle: Duration,
    /// How often an executing job polls its revocation marker
    pub revoke_poll_interval: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queues: vec![
                reelkit_queue::QUEUE_VIDEO.to_string(),
                reelkit_queue::QUEUE_AVATAR.to_string(),
                reelkit_queue::QUEUE_MAINTENANCE.to_string(),
            ],
            max_concurrent_jobs: 2,
            max_tasks_per_worker: 1000,
            work_dir: "/tmp/reelkit".to_string(),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            revoke_poll_interval: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let queues = std::env::var("WORKER_QUEUES")
            .map(|raw| {
                raw.split(',')
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|q| !q.is_empty())
            .unwrap_or(defaults.queues);

        Self {
            queues,
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS", defaults.max_concurrent_jobs),
            max_tasks_per_worker: env_parse(
                "WORKER_MAX_TASKS",
                defaults.max_tasks_per_worker,
            ),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
            claim_interval: Duration::from_secs(env_parse(
                "WORKER_CLAIM_INTERVAL_SECS",
                defaults.claim_interval.as_secs(),
            )),
            claim_min_idle: Duration::from_secs(env_parse(
                "WORKER_CLAIM_MIN_IDLE_SECS",
                defaults.claim_min_idle.as_secs(),
            )),
            revoke_poll_interval: Duration::from_secs(env_parse(
                "WORKER_REVOKE_POLL_SECS",
                defaults.revoke_poll_interval.as_secs(),
            )),
            shutdown_timeout: Duration::from_secs(env_parse(
                "WORKER_SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout.as_secs(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_queues_cover_all_streams() {
        let config = WorkerConfig::default();
        assert_eq!(config.queues, vec!["video", "avatar", "maintenance"]);
        assert_eq!(config.max_tasks_per_worker, 1000);
    }
}
