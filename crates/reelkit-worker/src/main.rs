//! Media pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelkit_ai::adapters::avatar::AvatarClient;
use reelkit_core::{FsBlobStore, MemoryVideoStore, SecretBox};
use reelkit_queue::{JobQueue, JobStatusStore};
use reelkit_worker::{JobExecutor, ProcessingContext, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reelkit=info".parse().expect("static directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting reelkit-worker");

    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        error!("Failed to install metrics recorder: {e}");
    }

    // An invalid encryption key is a fatal startup error even though the
    // worker itself never decrypts: failing here beats failing mid-job.
    if let Err(e) = SecretBox::from_env() {
        error!("Invalid ENCRYPTION_KEY: {e}");
        std::process::exit(1);
    }

    let config = WorkerConfig::from_env();
    info!(?config, "Worker config loaded");

    let queue = match JobQueue::from_env() {
        Ok(q) => Arc::new(q),
        Err(e) => {
            error!("Failed to create job queue: {e}");
            std::process::exit(1);
        }
    };

    let status = match JobStatusStore::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create status store: {e}");
            std::process::exit(1);
        }
    };

    let avatar = match AvatarClient::from_env() {
        Some(Ok(client)) => Some(client),
        Some(Err(e)) => {
            error!("Avatar client misconfigured: {e}");
            std::process::exit(1);
        }
        None => None,
    };

    let ctx = Arc::new(ProcessingContext {
        config,
        queue,
        status,
        // The relational and object stores are external collaborators;
        // the worker wires the in-process implementations for local mode.
        videos: MemoryVideoStore::new(),
        blobs: Arc::new(FsBlobStore::from_env()),
        avatar,
    });

    let executor = JobExecutor::new(ctx);
    let shutdown = executor.shutdown_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown.send(true).ok();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {e}");
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
