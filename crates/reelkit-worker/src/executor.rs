//! Job executor.
//!
//! Consumes the configured queues with prefetch 1, runs jobs under a
//! concurrency semaphore, reclaims orphaned work, promotes due retries
//! and recycles itself after the task budget.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reelkit_queue::QueueJob;

use crate::processor::{process_job, ProcessingContext};

/// How long one consume call blocks per queue.
const CONSUME_BLOCK_MS: u64 = 1000;

/// Jobs reclaimed per maintenance sweep.
const CLAIM_BATCH: usize = 5;

pub struct JobExecutor {
    ctx: Arc<ProcessingContext>,
    semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
    tasks_started: Arc<AtomicU64>,
}

impl JobExecutor {
    pub fn new(ctx: Arc<ProcessingContext>) -> Self {
        let semaphore = Arc::new(Semaphore::new(ctx.config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);

        Self {
            ctx,
            semaphore,
            shutdown,
            consumer_name: format!("worker-{}", Uuid::new_v4()),
            tasks_started: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Run until shutdown or the recycle budget is spent.
    pub async fn run(&self) -> crate::error::WorkerResult<()> {
        let queues: Vec<&str> = self.ctx.config.queues.iter().map(String::as_str).collect();
        info!(
            consumer = %self.consumer_name,
            queues = ?queues,
            concurrency = self.ctx.config.max_concurrent_jobs,
            "Starting job executor"
        );

        self.ctx.queue.init(&queues).await?;

        let maintenance = self.spawn_maintenance();
        let beat = tokio::spawn(crate::beat::run(
            Arc::clone(&self.ctx.queue),
            self.shutdown.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown.subscribe();
        'main: loop {
            if self.budget_spent() {
                info!(
                    tasks = self.tasks_started.load(Ordering::SeqCst),
                    "Task budget spent, recycling worker"
                );
                break;
            }

            for queue in &self.ctx.config.queues {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Shutdown signal received, stopping executor");
                            break 'main;
                        }
                    }
                    result = self.consume_one(queue) => {
                        if let Err(e) = result {
                            error!(queue, error = %e, "Error consuming queue");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        }

        maintenance.abort();
        self.shutdown.send(true).ok();
        beat.await.ok();

        info!("Waiting for in-flight jobs to complete...");
        tokio::time::timeout(self.ctx.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .ok();

        info!("Job executor stopped");
        Ok(())
    }

    fn budget_spent(&self) -> bool {
        self.tasks_started.load(Ordering::SeqCst) >= self.ctx.config.max_tasks_per_worker
    }

    /// Consume from one queue if a slot is free, spawning each job.
    async fn consume_one(&self, queue: &str) -> crate::error::WorkerResult<()> {
        if self.semaphore.available_permits() == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .ctx
            .queue
            .consume(queue, &self.consumer_name, CONSUME_BLOCK_MS)
            .await?;

        for (message_id, job) in jobs {
            self.spawn_job(queue.to_string(), message_id, job).await?;
        }

        Ok(())
    }

    async fn spawn_job(
        &self,
        queue: String,
        message_id: String,
        job: QueueJob,
    ) -> crate::error::WorkerResult<()> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| crate::error::WorkerError::job_failed("semaphore closed"))?;

        self.tasks_started.fetch_add(1, Ordering::SeqCst);
        let ctx = Arc::clone(&self.ctx);

        tokio::spawn(async move {
            let _permit = permit;
            Self::execute_job(ctx, queue, message_id, job).await;
        });

        Ok(())
    }

    /// Run a single job with retry, revocation and DLQ handling.
    async fn execute_job(
        ctx: Arc<ProcessingContext>,
        queue: String,
        message_id: String,
        job: QueueJob,
    ) {
        let job_id = job.job_id().clone();

        let attempts = match ctx.queue.record_attempt(&job_id).await {
            Ok(n) => n,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Attempt counter unavailable");
                1
            }
        };

        // Revoked while queued: never start.
        if ctx.queue.is_revoked(&job_id).await.unwrap_or(false) {
            info!(job_id = %job_id, "Job revoked before start");
            ctx.status.mark_revoked(&job_id, attempts).await.ok();
            ctx.queue.ack(&queue, &message_id).await.ok();
            ctx.queue.clear_dedup(&job).await.ok();
            return;
        }

        info!(job_id = %job_id, task = job.task_name(), attempts, "Executing job");

        match process_job(&ctx, &job, attempts).await {
            Ok(result) => {
                ctx.status.mark_success(&job_id, result, attempts).await.ok();
                ctx.queue.ack(&queue, &message_id).await.ok();
                ctx.queue.clear_dedup(&job).await.ok();
            }
            Err(e) if e.is_cancelled() => {
                ctx.status.mark_revoked(&job_id, attempts).await.ok();
                ctx.queue.ack(&queue, &message_id).await.ok();
                ctx.queue.clear_dedup(&job).await.ok();
            }
            Err(e) => {
                let max_attempts = ctx.queue.max_attempts();
                let retryable = e.is_retryable() && attempts < max_attempts;
                error!(
                    job_id = %job_id,
                    error = %e,
                    attempts,
                    retryable,
                    "Job failed"
                );
                metrics::counter!(
                    "reelkit_jobs_total",
                    "task" => job.task_name(),
                    "outcome" => if retryable { "retry" } else { "failure" }
                )
                .increment(1);

                if retryable {
                    match ctx.queue.schedule_retry(&job, attempts).await {
                        Ok(eta) => {
                            ctx.status
                                .mark_retry(&job_id, e.to_string(), attempts, eta)
                                .await
                                .ok();
                            // The delayed set owns the job now.
                            ctx.queue.ack(&queue, &message_id).await.ok();
                        }
                        Err(schedule_err) => {
                            error!(
                                job_id = %job_id,
                                error = %schedule_err,
                                "Retry scheduling failed, leaving message pending"
                            );
                            // Unacked: claim_pending redelivers it.
                        }
                    }
                } else {
                    ctx.queue.dlq(&queue, &message_id, &job, &e.to_string()).await.ok();
                    ctx.status
                        .mark_failure(&job_id, e.to_string(), attempts)
                        .await
                        .ok();
                    ctx.queue.clear_dedup(&job).await.ok();
                }
            }
        }
    }

    /// Periodic sweep: reclaim orphaned pending jobs and promote due
    /// delayed retries.
    fn spawn_maintenance(&self) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let consumer = self.consumer_name.clone();
        let mut shutdown = self.shutdown.subscribe();
        let semaphore = Arc::clone(&self.semaphore);
        let tasks_started = Arc::clone(&self.tasks_started);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ctx.config.claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        for queue in ctx.config.queues.clone() {
                            match ctx.queue.promote_due(&queue).await {
                                Ok(0) => {}
                                Ok(n) => debug!(queue = %queue, promoted = n, "Promoted due retries"),
                                Err(e) => warn!(queue = %queue, error = %e, "Promote sweep failed"),
                            }

                            let claimed = match ctx
                                .queue
                                .claim_pending(&queue, &consumer, ctx.config.claim_min_idle, CLAIM_BATCH)
                                .await
                            {
                                Ok(jobs) => jobs,
                                Err(e) => {
                                    warn!(queue = %queue, error = %e, "Claim sweep failed");
                                    continue;
                                }
                            };

                            for (message_id, job) in claimed {
                                let Ok(permit) =
                                    Arc::clone(&semaphore).acquire_owned().await
                                else {
                                    return;
                                };
                                tasks_started.fetch_add(1, Ordering::SeqCst);
                                let ctx = Arc::clone(&ctx);
                                let queue = queue.clone();
                                tokio::spawn(async move {
                                    let _permit = permit;
                                    Self::execute_job(ctx, queue, message_id, job).await;
                                });
                            }
                        }
                    }
                }
            }
        })
    }

    async fn wait_for_jobs(&self) {
        loop {
            if self.semaphore.available_permits() == self.ctx.config.max_concurrent_jobs {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
