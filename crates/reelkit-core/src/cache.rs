//! Redis-backed cache with TTL, pattern invalidation and memoization.
//!
//! The cache is a read-through optimization, never a source of truth: when
//! the backing store is unreachable, reads report a miss and writes are
//! no-ops so callers always proceed.

use std::future::Future;
use std::time::Duration;

use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};

/// Builds deterministic cache keys from a prefix, function name, positional
/// args and keyword args (sorted so call-site ordering does not matter).
#[derive(Debug, Clone)]
pub struct CacheKey {
    prefix: String,
    function: String,
    args: Vec<String>,
    kwargs: Vec<(String, String)>,
}

impl CacheKey {
    pub fn builder(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            function: String::new(),
            args: Vec::new(),
            kwargs: Vec::new(),
        }
    }

    pub fn function(mut self, name: impl Into<String>) -> Self {
        self.function = name.into();
        self
    }

    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.kwargs.push((key.into(), value.to_string()));
        self
    }

    pub fn build(mut self) -> String {
        let mut parts = vec![self.prefix, self.function];
        parts.extend(self.args);

        self.kwargs.sort_by(|a, b| a.0.cmp(&b.0));
        parts.extend(self.kwargs.into_iter().map(|(k, v)| format!("{k}={v}")));

        parts.retain(|p| !p.is_empty());
        parts.join(":")
    }
}

/// Shared cache client. Values are JSON on the wire; non-serializable
/// values must not be cached (caller contract).
#[derive(Clone)]
pub struct Cache {
    client: redis::Client,
}

impl Cache {
    pub fn new(redis_url: &str) -> CoreResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CoreError::storage(format!("invalid cache URL: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_env() -> CoreResult<Self> {
        let url =
            std::env::var("CACHE_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        Self::new(&url)
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Get a cached value. Backend errors degrade to a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache unreachable, treating as miss");
                return None;
            }
        };

        let raw: Option<String> = match conn.get(key).await {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached payload unparsable, treating as miss");
                None
            }
        })
    }

    /// Set a value with an optional TTL. Backend errors degrade to a no-op.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                warn!(key = %key, error = %e, "Refusing to cache non-serializable value");
                return;
            }
        };

        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache unreachable, skipping write");
                return;
            }
        };

        let result: Result<(), redis::RedisError> = match ttl {
            Some(ttl) => conn.set_ex(key, json, ttl.as_secs()).await,
            None => conn.set(key, json).await,
        };

        if let Err(e) = result {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Delete a single key. Returns whether a key was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(_) => return false,
        };
        let removed: Result<u64, redis::RedisError> = conn.del(key).await;
        removed.map(|n| n > 0).unwrap_or(false)
    }

    /// Best-effort glob deletion via SCAN. Not transactional: keys written
    /// concurrently may survive. Returns the number of keys deleted.
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Cache unreachable, skipping pattern delete");
                return 0;
            }
        };

        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let scan: Result<(u64, Vec<String>), redis::RedisError> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;

            let (next, keys) = match scan {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Pattern scan failed");
                    break;
                }
            };

            if !keys.is_empty() {
                let removed: Result<u64, redis::RedisError> = conn.del(&keys).await;
                deleted += removed.unwrap_or(0);
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, deleted, "Pattern delete finished");
        deleted
    }

    pub async fn exists(&self, key: &str) -> bool {
        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(_) => return false,
        };
        let exists: Result<bool, redis::RedisError> = conn.exists(key).await;
        exists.unwrap_or(false)
    }

    /// Atomic counter increment. Degrades to 0 when unreachable.
    pub async fn increment(&self, key: &str) -> i64 {
        let mut conn = match self.conn().await {
            Ok(c) => c,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache unreachable, increment skipped");
                return 0;
            }
        };
        let value: Result<i64, redis::RedisError> = conn.incr(key, 1).await;
        value.unwrap_or(0)
    }

    /// Remaining TTL, or `None` when the key is absent or has no expiry.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let mut conn = self.conn().await.ok()?;
        let secs: i64 = conn.ttl(key).await.ok()?;
        if secs > 0 {
            Some(Duration::from_secs(secs as u64))
        } else {
            None
        }
    }

    /// Memoize an async computation under `key` with the given TTL.
    ///
    /// Two calls with the same key inside the TTL invoke the computation
    /// exactly once (modulo concurrent stampedes, which this does not guard).
    pub async fn memoize<T, F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            debug!(key = %key, "Memoize hit");
            return Ok(hit);
        }

        let value = compute().await?;
        self.set(key, &value, Some(ttl)).await;
        Ok(value)
    }
}

/// Org-scoped key helper. Every tenant-owned cache entry goes through this
/// to prevent cross-tenant collisions.
pub fn org_key(org_id: &str, suffix: &str) -> String {
    format!("org:{org_id}:{suffix}")
}
