//! Web search adapter.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use reelkit_core::Credential;

use crate::error::{AiError, AiResult};

/// Search is the slowest external read the assistant performs.
const REQUEST_TIMEOUT_SECS: u64 = 120;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    /// Snippet or extracted page content
    pub content: String,
}

/// Search call output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    results: Vec<WireHit>,
}

#[derive(Debug, Deserialize)]
struct WireHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// HTTP search client.
pub struct SearchClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Credential,
}

impl SearchClient {
    pub fn new(api_key: Credential) -> AiResult<Self> {
        let base_url =
            std::env::var("SEARCH_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: Credential, base_url: impl Into<String>) -> AiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AiError::provider(format!("client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build from the environment; `None` when the key is absent or a
    /// placeholder.
    pub fn from_env() -> Option<AiResult<Self>> {
        Credential::from_env("SEARCH_API_KEY").map(Self::new)
    }

    /// Run a search. `depth` is `basic` or `advanced`.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: &str,
    ) -> AiResult<SearchResults> {
        let body = serde_json::json!({
            "api_key": self.api_key.expose(),
            "query": query,
            "max_results": max_results,
            "search_depth": depth,
        });

        debug!(query, max_results, "Running web search");

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(REQUEST_TIMEOUT_SECS)
                } else {
                    AiError::provider(format!("search request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AiError::provider(format!("search returned {status}")));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| AiError::provider(format!("malformed search response: {e}")))?;

        Ok(SearchResults {
            results: parsed
                .results
                .into_iter()
                .take(max_results)
                .map(|h| SearchHit {
                    title: h.title,
                    url: h.url,
                    content: h.content,
                })
                .collect(),
        })
    }
}
