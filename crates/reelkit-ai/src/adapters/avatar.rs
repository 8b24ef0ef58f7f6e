//! Avatar-video vendor adapter.
//!
//! `create_video` only launches the render; completion arrives later on
//! an HMAC-guarded inbound webhook.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use reelkit_core::Credential;

use crate::error::{AiError, AiResult};

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// A launched avatar render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarJob {
    /// Vendor-side job identifier, echoed back in the webhook
    pub external_job_id: String,
    /// Always "processing" at creation
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(alias = "video_id", alias = "job_id")]
    id: String,
}

/// HTTP client for the avatar-video vendor.
pub struct AvatarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Credential,
}

impl AvatarClient {
    pub fn new(api_key: Credential, base_url: impl Into<String>) -> AiResult<Self> {
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

    pub fn from_env() -> Option<AiResult<Self>> {
        let key = Credential::from_env("AVATAR_API_KEY")?;
        let base = std::env::var("AVATAR_BASE_URL").ok()?;
        Some(Self::new(key, base))
    }

    /// Launch a render. The returned job completes via webhook.
    pub async fn create_video(
        &self,
        script: &str,
        avatar_id: &str,
        voice_id: &str,
    ) -> AiResult<AvatarJob> {
        let body = serde_json::json!({
            "script": script,
            "avatar_id": avatar_id,
            "voice_id": voice_id,
        });

        let response = self
            .client
            .post(format!("{}/v1/videos", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::provider(format!("avatar request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::provider(format!(
                "avatar vendor returned {status}: {}",
                body.chars().take(300).collect::<String>()
            )));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| AiError::provider(format!("malformed avatar response: {e}")))?;

        info!(external_job_id = %parsed.id, "Avatar render launched");
        Ok(AvatarJob {
            external_job_id: parsed.id,
            status: "processing".to_string(),
        })
    }
}
