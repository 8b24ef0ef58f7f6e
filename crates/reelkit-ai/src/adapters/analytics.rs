//! Read-only analytics adapter.
//!
//! The vendor is swappable, so the surface is a trait. `CachedAnalytics`
//! wraps any implementation with the stale-on-miss contract: a
//! `DataUnavailable` failure returns the cached payload (flagged stale)
//! when one exists, and surfaces the error otherwise.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use reelkit_core::cache::{org_key, Cache, CacheKey};
use reelkit_core::Credential;
use reelkit_models::OrgId;

/// Analytics reads are interactive; keep them snappy.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// How long a successful read stays fresh.
const CACHE_TTL: Duration = Duration::from_secs(600);

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The vendor could not serve the read right now. Callers with a
    /// cached value fall back to it; without one this maps to HTTP 503.
    #[error("Analytics data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Analytics not linked for this organization")]
    NotLinked,
}

/// Read methods the core needs from the analytics vendor.
#[async_trait]
pub trait AnalyticsAdapter: Send + Sync {
    async fn dashboard_metrics(&self, org_id: &OrgId, blog_id: &str) -> AnalyticsResult<Value>;

    async fn posts_performance(
        &self,
        org_id: &OrgId,
        blog_id: &str,
        from: Option<&str>,
        to: Option<&str>,
        platform: Option<&str>,
        sort_by: &str,
        order: &str,
    ) -> AnalyticsResult<Value>;

    async fn best_times(
        &self,
        org_id: &OrgId,
        blog_id: &str,
        platform: Option<&str>,
    ) -> AnalyticsResult<Value>;

    async fn platform_breakdown(
        &self,
        org_id: &OrgId,
        blog_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> AnalyticsResult<Value>;

    async fn connected_accounts(&self, org_id: &OrgId, blog_id: &str) -> AnalyticsResult<Value>;
}

/// HTTP implementation over the analytics vendor API.
pub struct HttpAnalyticsAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Credential,
}

impl HttpAnalyticsAdapter {
    pub fn new(api_key: Credential, base_url: impl Into<String>) -> AnalyticsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AnalyticsError::DataUnavailable(format!("client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build from the environment; `None` when no analytics linkage is
    /// configured.
    pub fn from_env() -> Option<AnalyticsResult<Self>> {
        let key = Credential::from_env("ANALYTICS_API_KEY")?;
        let base = std::env::var("ANALYTICS_BASE_URL").ok()?;
        Some(Self::new(key, base))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> AnalyticsResult<Value> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose())
            .query(query)
            .send()
            .await
            .map_err(|e| AnalyticsError::DataUnavailable(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AnalyticsError::DataUnavailable(format!(
                "analytics returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AnalyticsError::DataUnavailable(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl AnalyticsAdapter for HttpAnalyticsAdapter {
    async fn dashboard_metrics(&self, org_id: &OrgId, blog_id: &str) -> AnalyticsResult<Value> {
        self.get(
            "/v1/metrics/dashboard",
            &[("org", org_id.to_string()), ("blog", blog_id.to_string())],
        )
        .await
    }

    async fn posts_performance(
        &self,
        org_id: &OrgId,
        blog_id: &str,
        from: Option<&str>,
        to: Option<&str>,
        platform: Option<&str>,
        sort_by: &str,
        order: &str,
    ) -> AnalyticsResult<Value> {
        let mut query = vec![
            ("org", org_id.to_string()),
            ("blog", blog_id.to_string()),
            ("sort_by", sort_by.to_string()),
            ("order", order.to_string()),
        ];
        if let Some(from) = from {
            query.push(("from", from.to_string()));
        }
        if let Some(to) = to {
            query.push(("to", to.to_string()));
        }
        if let Some(platform) = platform {
            query.push(("platform", platform.to_string()));
        }
        self.get("/v1/metrics/posts", &query).await
    }

    async fn best_times(
        &self,
        org_id: &OrgId,
        blog_id: &str,
        platform: Option<&str>,
    ) -> AnalyticsResult<Value> {
        let mut query = vec![("org", org_id.to_string()), ("blog", blog_id.to_string())];
        if let Some(platform) = platform {
            query.push(("platform", platform.to_string()));
        }
        self.get("/v1/metrics/best-times", &query).await
    }

    async fn platform_breakdown(
        &self,
        org_id: &OrgId,
        blog_id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> AnalyticsResult<Value> {
        let mut query = vec![("org", org_id.to_string()), ("blog", blog_id.to_string())];
        if let Some(from) = from {
            query.push(("from", from.to_string()));
        }
        if let Some(to) = to {
            query.push(("to", to.to_string()));
        }
        self.get("/v1/metrics/platforms", &query).await
    }

    async fn connected_accounts(&self, org_id: &OrgId, blog_id: &str) -> AnalyticsResult<Value> {
        self.get(
            "/v1/accounts",
            &[("org", org_id.to_string()), ("blog", blog_id.to_string())],
        )
        .await
    }
}

/// Cache wrapper implementing the stale-on-miss contract.
pub struct CachedAnalytics {
    inner: Arc<dyn AnalyticsAdapter>,
    cache: Cache,
}

impl CachedAnalytics {
    pub fn new(inner: Arc<dyn AnalyticsAdapter>, cache: Cache) -> Self {
        Self { inner, cache }
    }

    fn key(org_id: &OrgId, blog_id: &str, function: &str, parts: &[Option<&str>]) -> String {
        let mut builder = CacheKey::builder("analytics").function(function).arg(blog_id);
        for part in parts.iter().flatten() {
            builder = builder.arg(part);
        }
        org_key(org_id.as_str(), &builder.build())
    }

    async fn read_through(
        &self,
        key: String,
        fresh: AnalyticsResult<Value>,
    ) -> AnalyticsResult<Value> {
        match fresh {
            Ok(value) => {
                self.cache.set(&key, &value, Some(CACHE_TTL)).await;
                Ok(value)
            }
            Err(AnalyticsError::DataUnavailable(reason)) => {
                if let Some(cached) = self.cache.get::<Value>(&key).await {
                    warn!(key = %key, reason = %reason, "Analytics miss, serving stale cache");
                    return Ok(serde_json::json!({"stale": true, "data": cached}));
                }
                debug!(key = %key, "Analytics miss with cold cache");
                Err(AnalyticsError::DataUnavailable(reason))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn dashboard_metrics(&self, org_id: &OrgId, blog_id: &str) -> AnalyticsResult<Value> {
        let key = Self::key(org_id, blog_id, "dashboard_metrics", &[]);
        let fresh = self.inner.dashboard_metrics(org_id, blog_id).await;
        self.read_through(key, fresh).await
    }

    pub async fn best_times(
        &self,
        org_id: &OrgId,
        blog_id: &str,
        platform: Option<&str>,
    ) -> AnalyticsResult<Value> {
        let key = Self::key(org_id, blog_id, "best_times", &[platform]);
        let fresh = self.inner.best_times(org_id, blog_id, platform).await;
        self.read_through(key, fresh).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakyAdapter {
        fail: AtomicBool,
    }

    #[async_trait]
    impl AnalyticsAdapter for FlakyAdapter {
        async fn dashboard_metrics(&self, _org: &OrgId, _blog: &str) -> AnalyticsResult<Value> {
            if self.fail.load(Ordering::SeqCst) {
                Err(AnalyticsError::DataUnavailable("vendor down".to_string()))
            } else {
                Ok(serde_json::json!({"views": 120}))
            }
        }

        async fn posts_performance(
            &self,
            _org: &OrgId,
            _blog: &str,
            _from: Option<&str>,
            _to: Option<&str>,
            _platform: Option<&str>,
            _sort_by: &str,
            _order: &str,
        ) -> AnalyticsResult<Value> {
            Ok(Value::Null)
        }

        async fn best_times(
            &self,
            _org: &OrgId,
            _blog: &str,
            _platform: Option<&str>,
        ) -> AnalyticsResult<Value> {
            Ok(Value::Null)
        }

        async fn platform_breakdown(
            &self,
            _org: &OrgId,
            _blog: &str,
            _from: Option<&str>,
            _to: Option<&str>,
        ) -> AnalyticsResult<Value> {
            Ok(Value::Null)
        }

        async fn connected_accounts(&self, _org: &OrgId, _blog: &str) -> AnalyticsResult<Value> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn test_cold_cache_surfaces_error() {
        // Unreachable cache == always-cold cache
        let cache = Cache::new("redis://127.0.0.1:1").unwrap();
        let adapter = CachedAnalytics::new(
            Arc::new(FlakyAdapter {
                fail: AtomicBool::new(true),
            }),
            cache,
        );

        let err = adapter
            .dashboard_metrics(&OrgId::from("org_1"), "blog_1")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::DataUnavailable(_)));
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_stale_data_served_on_miss() {
        dotenvy::dotenv().ok();
        let cache = Cache::from_env().unwrap();
        let inner = Arc::new(FlakyAdapter {
            fail: AtomicBool::new(false),
        });
        let adapter = CachedAnalytics::new(inner.clone(), cache);
        let org = OrgId::from("org_stale_test");

        // Warm read
        let fresh = adapter.dashboard_metrics(&org, "blog_1").await.unwrap();
        assert_eq!(fresh["views"], 120);

        // Vendor goes down; stale payload comes back flagged
        inner.fail.store(true, Ordering::SeqCst);
        let stale = adapter.dashboard_metrics(&org, "blog_1").await.unwrap();
        assert_eq!(stale["stale"], true);
        assert_eq!(stale["data"]["views"], 120);
    }
}
