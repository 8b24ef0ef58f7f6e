//! Queue worker for the media and AI pipeline.
//!
//! This crate provides:
//! - The executor: bounded-concurrency consumption with crash reclaim,
//!   delayed-retry promotion and worker recycling
//! - Processors for video processing, avatar renders and video GC
//! - The beat clock for periodic jobs

pub mod beat;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod processor;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use processor::ProcessingContext;
