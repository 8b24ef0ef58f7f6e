//! Cross-cutting core services.
//!
//! This crate provides:
//! - AES-256-GCM envelope for third-party credentials at rest
//! - HMAC-SHA256 webhook signature verification
//! - Redis-backed cache with TTL, pattern invalidation and memoization
//! - Central sanitization for user-origin strings
//! - Contracts for the video row store and blob store collaborators

pub mod cache;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod sanitize;
pub mod stores;
pub mod webhook;

pub use cache::{Cache, CacheKey};
pub use credential::Credential;
pub use crypto::SecretBox;
pub use error::{CoreError, CoreResult};
pub use stores::{BlobStore, FsBlobStore, MemoryVideoStore, VideoStore};
