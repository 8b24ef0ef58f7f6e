//! Provider-abstracted model router.
//!
//! Two modes are built once at startup: **gateway** (an OpenAI-compatible
//! façade routing by model id) and **direct vendor** (the Gemini API with
//! a built-in model list). Each capability maps to an ordered fallback
//! chain tried left to right; the first non-failing result wins and the
//! last error surfaces when all fail.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use reelkit_core::Credential;
use reelkit_models::ChatRole;

use crate::error::{AiError, AiResult};

/// LLM calls are bounded; slow models fail over rather than hang.
const REQUEST_TIMEOUT_SECS: u64 = 120;

const DEFAULT_GEMINI_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite"];

/// Logical operations the router serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Script,
    Description,
    Assistant,
    Fallback,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Script => "script",
            Capability::Description => "description",
            Capability::Assistant => "assistant",
            Capability::Fallback => "fallback",
        }
    }

    fn env_var(&self) -> &'static str {
        match self {
            Capability::Script => "MODEL_SCRIPT",
            Capability::Description => "MODEL_DESCRIPTION",
            Capability::Assistant => "MODEL_ASSISTANT",
            Capability::Fallback => "MODEL_FALLBACK",
        }
    }
}

/// One completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    /// Model that actually answered (may be a fallback)
    pub model: String,
    pub tokens_used: Option<u32>,
}

/// A message in a chat exchange.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A tool offered to the model for function calling.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool input
    pub input_schema: Value,
}

/// Ordered content emitted by the model in one turn.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    ToolUse { name: String, input: Value },
}

/// Result of a chat call: blocks in emission order.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub blocks: Vec<ContentBlock>,
    pub model: String,
    pub tokens_used: Option<u32>,
}

/// Backend behind the router: one concrete vendor protocol.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str, max_tokens: u32) -> AiResult<Generation>;

    async fn chat(
        &self,
        model: &str,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> AiResult<ChatOutcome>;
}

/// Capability-routing front door.
pub struct ModelRouter {
    backend: Option<Arc<dyn LlmBackend>>,
    chains: HashMap<Capability, Vec<String>>,
}

impl ModelRouter {
    pub fn new(backend: Arc<dyn LlmBackend>, chains: HashMap<Capability, Vec<String>>) -> Self {
        Self {
            backend: Some(backend),
            chains,
        }
    }

    /// A router with no usable backend; every call fails fast with
    /// `NotConfigured` instead of leaking opaque vendor errors.
    pub fn unconfigured() -> Self {
        Self {
            backend: None,
            chains: HashMap::new(),
        }
    }

    /// Build from the environment. Gateway mode wins when its key is a
    /// real credential; the direct vendor is next; otherwise unconfigured.
    pub fn from_env() -> Self {
        if let Some(key) = Credential::from_env("LLM_GATEWAY_KEY") {
            let base_url = std::env::var("LLM_GATEWAY_URL")
                .unwrap_or_else(|_| "https://gateway.reelkit.internal/v1".to_string());

            let mut chains = HashMap::new();
            let fallback = std::env::var(Capability::Fallback.env_var()).ok();
            for capability in [
                Capability::Script,
                Capability::Description,
                Capability::Assistant,
                Capability::Fallback,
            ] {
                let mut chain: Vec<String> =
                    std::env::var(capability.env_var()).ok().into_iter().collect();
                if capability != Capability::Fallback {
                    if let Some(fb) = &fallback {
                        if !chain.contains(fb) {
                            chain.push(fb.clone());
                        }
                    }
                }
                if !chain.is_empty() {
                    chains.insert(capability, chain);
                }
            }

            info!(mode = "gateway", "Model router configured");
            return Self::new(Arc::new(GatewayBackend::new(base_url, key)), chains);
        }

        if let Some(key) = Credential::from_env("GEMINI_API_KEY") {
            let chain: Vec<String> = DEFAULT_GEMINI_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect();
            let chains = [
                Capability::Script,
                Capability::Description,
                Capability::Assistant,
                Capability::Fallback,
            ]
            .into_iter()
            .map(|c| (c, chain.clone()))
            .collect();

            info!(mode = "direct_vendor", "Model router configured");
            return Self::new(Arc::new(GeminiBackend::new(key)), chains);
        }

        warn!("No LLM credential configured; model calls will fail fast");
        Self::unconfigured()
    }

    fn chain(&self, capability: Capability) -> AiResult<(&Arc<dyn LlmBackend>, &[String])> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| AiError::not_configured("no LLM credential configured"))?;
        let chain = self
            .chains
            .get(&capability)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AiError::not_configured(format!(
                    "no model configured for capability '{}'",
                    capability.as_str()
                ))
            })?;
        Ok((backend, chain))
    }

    /// Generate text for a capability, walking its fallback chain.
    pub async fn generate(
        &self,
        capability: Capability,
        prompt: &str,
        max_tokens: u32,
    ) -> AiResult<Generation> {
        let (backend, chain) = self.chain(capability)?;

        let mut last_error = None;
        for model in chain {
            match backend.generate(model, prompt, max_tokens).await {
                Ok(generation) => return Ok(generation),
                Err(e) => {
                    warn!(
                        capability = capability.as_str(),
                        model = %model,
                        error = %e,
                        "Model failed, trying next in chain"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AiError::provider("all models failed")))
    }

    /// Run a function-calling chat turn, walking the capability's chain.
    pub async fn chat(
        &self,
        capability: Capability,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> AiResult<ChatOutcome> {
        let (backend, chain) = self.chain(capability)?;

        let mut last_error = None;
        for model in chain {
            match backend.chat(model, system, messages, tools, max_tokens).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    warn!(
                        capability = capability.as_str(),
                        model = %model,
                        error = %e,
                        "Model failed, trying next in chain"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AiError::provider("all models failed")))
    }
}

fn http_client() -> AiResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| AiError::provider(format!("client build failed: {e}")))
}

fn map_request_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout(REQUEST_TIMEOUT_SECS)
    } else {
        AiError::provider(format!("request failed: {e}"))
    }
}

async fn check_status(response: reqwest::Response) -> AiResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AiError::provider(format!(
        "model endpoint returned {status}: {}",
        body.chars().take(300).collect::<String>()
    )))
}

/// OpenAI-compatible gateway backend.
pub struct GatewayBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Credential,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    choices: Vec<GatewayChoice>,
    #[serde(default)]
    usage: Option<GatewayUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayChoice {
    message: GatewayMessage,
}

#[derive(Debug, Deserialize)]
struct GatewayMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<GatewayToolCall>,
}

#[derive(Debug, Deserialize)]
struct GatewayToolCall {
    function: GatewayFunction,
}

#[derive(Debug, Deserialize)]
struct GatewayFunction {
    name: String,
    /// JSON-encoded argument object
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct GatewayUsage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl GatewayBackend {
    pub fn new(base_url: impl Into<String>, api_key: Credential) -> Self {
        Self {
            client: http_client().unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> AiResult<GatewayResponse> {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            wire_messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for message in messages {
            let role = match message.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            wire_messages.push(serde_json::json!({"role": role, "content": message.content}));
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": wire_messages,
            "max_tokens": max_tokens,
        });
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        }
                    })
                })
                .collect();
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AiError::provider(format!("malformed gateway response: {e}")))
    }

    fn into_outcome(model: &str, parsed: GatewayResponse) -> AiResult<ChatOutcome> {
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::provider("gateway response had no choices"))?;

        let mut blocks = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            blocks.push(ContentBlock::Text(text));
        }
        for call in choice.message.tool_calls {
            let input = serde_json::from_str(&call.function.arguments)
                .map_err(|e| AiError::provider(format!("malformed tool arguments: {e}")))?;
            blocks.push(ContentBlock::ToolUse {
                name: call.function.name,
                input,
            });
        }

        Ok(ChatOutcome {
            blocks,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            tokens_used: parsed.usage.and_then(|u| u.total_tokens),
        })
    }
}

#[async_trait]
impl LlmBackend for GatewayBackend {
    async fn generate(&self, model: &str, prompt: &str, max_tokens: u32) -> AiResult<Generation> {
        let messages = [ChatMessage::user(prompt)];
        let parsed = self.complete(model, None, &messages, &[], max_tokens).await?;
        let outcome = Self::into_outcome(model, parsed)?;

        let text = outcome
            .blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                ContentBlock::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AiError::provider("gateway returned no text"));
        }

        Ok(Generation {
            text,
            model: outcome.model,
            tokens_used: outcome.tokens_used,
        })
    }

    async fn chat(
        &self,
        model: &str,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> AiResult<ChatOutcome> {
        let parsed = self
            .complete(model, Some(system), messages, tools, max_tokens)
            .await?;
        Self::into_outcome(model, parsed)
    }
}

/// Direct-vendor backend over the Gemini `generateContent` API.
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Credential,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(default, rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

impl GeminiBackend {
    pub fn new(api_key: Credential) -> Self {
        Self::with_base_url(api_key, "https://generativelanguage.googleapis.com")
    }

    pub fn with_base_url(api_key: Credential, base_url: impl Into<String>) -> Self {
        Self {
            client: http_client().unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn call(
        &self,
        model: &str,
        system: Option<&str>,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> AiResult<GeminiResponse> {
        let contents: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                };
                serde_json::json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {"maxOutputTokens": max_tokens},
        });
        if let Some(system) = system {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": system}]});
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::json!([{
                "functionDeclarations": tools
                    .iter()
                    .map(|t| serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }))
                    .collect::<Vec<_>>()
            }]);
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url,
            model,
            self.api_key.expose()
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AiError::provider(format!("malformed vendor response: {e}")))
    }

    fn into_outcome(model: &str, parsed: GeminiResponse) -> AiResult<ChatOutcome> {
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AiError::provider("vendor response had no candidates"))?;

        let mut blocks = Vec::new();
        for part in candidate.content.parts {
            if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                blocks.push(ContentBlock::Text(text));
            }
            if let Some(call) = part.function_call {
                blocks.push(ContentBlock::ToolUse {
                    name: call.name,
                    input: call.args,
                });
            }
        }

        Ok(ChatOutcome {
            blocks,
            model: model.to_string(),
            tokens_used: parsed.usage_metadata.and_then(|u| u.total_token_count),
        })
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn generate(&self, model: &str, prompt: &str, max_tokens: u32) -> AiResult<Generation> {
        let messages = [ChatMessage::user(prompt)];
        let parsed = self.call(model, None, &messages, &[], max_tokens).await?;
        let outcome = Self::into_outcome(model, parsed)?;

        let text = outcome
            .blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.as_str()),
                ContentBlock::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AiError::provider("vendor returned no text"));
        }

        Ok(Generation {
            text,
            model: outcome.model,
            tokens_used: outcome.tokens_used,
        })
    }

    async fn chat(
        &self,
        model: &str,
        system: &str,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        max_tokens: u32,
    ) -> AiResult<ChatOutcome> {
        let parsed = self
            .call(model, Some(system), messages, tools, max_tokens)
            .await?;
        Self::into_outcome(model, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chains(models: &[&str]) -> HashMap<Capability, Vec<String>> {
        let chain: Vec<String> = models.iter().map(|m| m.to_string()).collect();
        [(Capability::Script, chain)].into_iter().collect()
    }

    struct CountingBackend {
        calls: AtomicU32,
        fail_models: Vec<String>,
    }

    #[async_trait]
    impl LlmBackend for CountingBackend {
        async fn generate(
            &self,
            model: &str,
            _prompt: &str,
            _max_tokens: u32,
        ) -> AiResult<Generation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_models.iter().any(|m| m == model) {
                return Err(AiError::provider(format!("{model} unavailable")));
            }
            Ok(Generation {
                text: "ok".to_string(),
                model: model.to_string(),
                tokens_used: Some(10),
            })
        }

        async fn chat(
            &self,
            model: &str,
            _system: &str,
            _messages: &[ChatMessage],
            _tools: &[ToolSpec],
            _max_tokens: u32,
        ) -> AiResult<ChatOutcome> {
            self.generate(model, "", 0).await.map(|g| ChatOutcome {
                blocks: vec![ContentBlock::Text(g.text)],
                model: g.model,
                tokens_used: g.tokens_used,
            })
        }
    }

    #[tokio::test]
    async fn test_fallback_chain_stops_at_first_success() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicU32::new(0),
            fail_models: vec!["fake/unavailable".to_string()],
        });
        let router = ModelRouter::new(
            backend.clone(),
            chains(&["fake/unavailable", "real/available", "never/reached"]),
        );

        let generation = router
            .generate(Capability::Script, "topic X", 500)
            .await
            .unwrap();

        assert_eq!(generation.model, "real/available");
        // m1 failed, m2 succeeded, m3 never invoked
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_all_models_failing_surfaces_last_error() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicU32::new(0),
            fail_models: vec!["a".to_string(), "b".to_string()],
        });
        let router = ModelRouter::new(backend, chains(&["a", "b"]));

        let err = router.generate(Capability::Script, "p", 100).await.unwrap_err();
        assert!(matches!(err, AiError::Provider(msg) if msg.contains("b")));
    }

    #[tokio::test]
    async fn test_unconfigured_capability_fails_fast() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicU32::new(0),
            fail_models: vec![],
        });
        let router = ModelRouter::new(backend, chains(&["m"]));

        let err = router
            .generate(Capability::Description, "p", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_router_fails_fast() {
        let router = ModelRouter::unconfigured();
        let err = router.generate(Capability::Script, "p", 100).await.unwrap_err();
        assert!(matches!(err, AiError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_gateway_parses_text_and_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "assistant-1",
                "choices": [{
                    "message": {
                        "content": "Agendando...",
                        "tool_calls": [{
                            "function": {
                                "name": "schedule_post",
                                "arguments": "{\"platform\":\"instagram\"}"
                            }
                        }]
                    }
                }],
                "usage": {"total_tokens": 42}
            })))
            .mount(&server)
            .await;

        let backend = GatewayBackend::new(server.uri(), Credential::from_value("k").unwrap());
        let outcome = backend
            .chat("assistant-1", "system", &[ChatMessage::user("agende")], &[], 500)
            .await
            .unwrap();

        assert_eq!(outcome.blocks.len(), 2);
        assert!(matches!(&outcome.blocks[0], ContentBlock::Text(t) if t == "Agendando..."));
        assert!(matches!(
            &outcome.blocks[1],
            ContentBlock::ToolUse { name, input }
                if name == "schedule_post" && input["platform"] == "instagram"
        ));
        assert_eq!(outcome.tokens_used, Some(42));
    }

    #[tokio::test]
    async fn test_gateway_5xx_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let backend = GatewayBackend::new(server.uri(), Credential::from_value("k").unwrap());
        let err = backend.generate("m", "p", 10).await.unwrap_err();
        assert!(matches!(err, AiError::Provider(_)));
    }
}
