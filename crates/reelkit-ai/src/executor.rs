//! Tool dispatch.
//!
//! Every tool call resolves to a structured JSON result; a failing tool
//! reports `{success: false, error}` and never fails the chat turn.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use reelkit_models::OrgId;

use crate::adapters::analytics::{AnalyticsError, CachedAnalytics};
use crate::adapters::search::SearchClient;
use crate::error::{AiError, AiResult};
use crate::generate;
use crate::router::ModelRouter;
use crate::tools::{
    CancelPostInput, GenerateDescriptionsInput, GenerateScriptInput, GetAnalyticsInput,
    GetBestTimesInput, NavigateInput, RegenerateScriptInput, ReschedulePostInput,
    SchedulePostInput, SearchWebInput,
};

/// Hits returned to the model per search call.
const SEARCH_RESULT_CAP: usize = 5;

const DEFAULT_SCRIPT_DURATION_SECS: u32 = 60;

/// Fixed page token -> app URL table for `navigate`.
const PAGES: &[(&str, &str)] = &[
    ("dashboard", "/dashboard"),
    ("calendar", "/calendar"),
    ("videos", "/videos"),
    ("editor", "/editor"),
    ("analytics", "/analytics"),
    ("settings", "/settings"),
];

/// Tenant scope a tool runs under.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub org_id: OrgId,
    pub blog_id: Option<String>,
}

/// Outcome of one tool dispatch.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub result: Value,
    /// Whether the tool body ran to a successful result
    pub success: bool,
}

impl ToolOutcome {
    fn ok(result: Value) -> Self {
        Self {
            result,
            success: true,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            result: json!({"success": false, "error": error.into()}),
            success: false,
        }
    }

    fn not_configured(message: impl Into<String>) -> Self {
        Self {
            result: json!({"success": false, "not_configured": true, "message": message.into()}),
            success: false,
        }
    }
}

/// Dispatches named tools against the shared library layer.
pub struct ToolExecutor {
    router: Arc<ModelRouter>,
    search: Option<SearchClient>,
    analytics: Option<Arc<CachedAnalytics>>,
}

impl ToolExecutor {
    pub fn new(
        router: Arc<ModelRouter>,
        search: Option<SearchClient>,
        analytics: Option<Arc<CachedAnalytics>>,
    ) -> Self {
        Self {
            router,
            search,
            analytics,
        }
    }

    /// Execute a tool by name. Errors are folded into the outcome.
    pub async fn execute(&self, name: &str, input: Value, ctx: &ToolContext) -> ToolOutcome {
        debug!(tool = name, org_id = %ctx.org_id, "Executing tool");

        let outcome = match name {
            "generate_script" => self.generate_script(input).await,
            "regenerate_script" => self.regenerate_script(input).await,
            "schedule_post" => self.schedule_post(input),
            "reschedule_post" => self.reschedule_post(input),
            "cancel_post" => self.cancel_post(input),
            "get_analytics" => self.get_analytics(input, ctx).await,
            "get_best_times" => self.get_best_times(input, ctx).await,
            "generate_descriptions" => self.generate_descriptions(input).await,
            "search_web" => self.search_web(input).await,
            "navigate" => self.navigate(input),
            other => Err(AiError::validation(format!("unknown tool: {other}"))),
        };

        match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(tool = name, error = %e, "Tool failed");
                ToolOutcome::failed(e.to_string())
            }
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(input: Value) -> AiResult<T> {
        serde_json::from_value(input)
            .map_err(|e| AiError::validation(format!("invalid tool input: {e}")))
    }

    async fn generate_script(&self, input: Value) -> AiResult<ToolOutcome> {
        let input: GenerateScriptInput = Self::parse(input)?;
        let script = generate::generate_script_from_research(
            &self.router,
            self.search.as_ref(),
            &input.topic,
            input.duration_seconds.unwrap_or(DEFAULT_SCRIPT_DURATION_SECS),
            input.tone.as_deref(),
        )
        .await?;

        Ok(ToolOutcome::ok(json!({
            "success": true,
            "script": script.script,
            "model": script.model,
            "sources": script.sources,
        })))
    }

    async fn regenerate_script(&self, input: Value) -> AiResult<ToolOutcome> {
        let input: RegenerateScriptInput = Self::parse(input)?;
        let topic = match &input.feedback {
            Some(feedback) => format!("{} (ajuste solicitado: {feedback})", input.topic),
            None => input.topic.clone(),
        };

        let script = generate::generate_script_from_research(
            &self.router,
            self.search.as_ref(),
            &topic,
            DEFAULT_SCRIPT_DURATION_SECS,
            input.tone.as_deref(),
        )
        .await?;

        Ok(ToolOutcome::ok(json!({
            "success": true,
            "script": script.script,
            "model": script.model,
        })))
    }

    fn validate_future(raw: &str) -> AiResult<DateTime<Utc>> {
        let parsed = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| AiError::validation(format!("data inválida ({e})")))?
            .with_timezone(&Utc);

        if parsed <= Utc::now() {
            return Err(AiError::validation(
                "a data agendada precisa estar no futuro",
            ));
        }
        Ok(parsed)
    }

    // The real scheduling backend has not landed; these register the
    // intent and return a stub id the front-end can track.
    fn schedule_post(&self, input: Value) -> AiResult<ToolOutcome> {
        let input: SchedulePostInput = Self::parse(input)?;
        let scheduled_at = Self::validate_future(&input.scheduled_at)?;

        Ok(ToolOutcome::ok(json!({
            "success": true,
            "post_id": Uuid::new_v4().to_string(),
            "platform": input.platform,
            "scheduled_at": scheduled_at.to_rfc3339(),
            "pending_backend": true,
        })))
    }

    fn reschedule_post(&self, input: Value) -> AiResult<ToolOutcome> {
        let input: ReschedulePostInput = Self::parse(input)?;
        let scheduled_at = Self::validate_future(&input.scheduled_at)?;

        Ok(ToolOutcome::ok(json!({
            "success": true,
            "post_id": input.post_id,
            "scheduled_at": scheduled_at.to_rfc3339(),
            "pending_backend": true,
        })))
    }

    fn cancel_post(&self, input: Value) -> AiResult<ToolOutcome> {
        let input: CancelPostInput = Self::parse(input)?;

        Ok(ToolOutcome::ok(json!({
            "success": true,
            "post_id": input.post_id,
            "cancelled": true,
            "pending_backend": true,
        })))
    }

    async fn get_analytics(&self, input: Value, ctx: &ToolContext) -> AiResult<ToolOutcome> {
        let _input: GetAnalyticsInput = Self::parse(input)?;

        let Some(analytics) = &self.analytics else {
            return Ok(ToolOutcome::not_configured(
                "nenhuma conta de análise conectada",
            ));
        };
        let blog_id = ctx.blog_id.as_deref().unwrap_or("default");

        match analytics.dashboard_metrics(&ctx.org_id, blog_id).await {
            Ok(metrics) => Ok(ToolOutcome::ok(json!({"success": true, "metrics": metrics}))),
            Err(AnalyticsError::NotLinked) => Ok(ToolOutcome::not_configured(
                "nenhuma conta de análise conectada",
            )),
            Err(e) => Ok(ToolOutcome::failed(e.to_string())),
        }
    }

    async fn get_best_times(&self, input: Value, ctx: &ToolContext) -> AiResult<ToolOutcome> {
        let input: GetBestTimesInput = Self::parse(input)?;

        let Some(analytics) = &self.analytics else {
            return Ok(ToolOutcome::not_configured(
                "nenhuma conta de análise conectada",
            ));
        };
        let blog_id = ctx.blog_id.as_deref().unwrap_or("default");

        match analytics
            .best_times(&ctx.org_id, blog_id, input.platform.as_deref())
            .await
        {
            Ok(times) => Ok(ToolOutcome::ok(json!({"success": true, "best_times": times}))),
            Err(AnalyticsError::NotLinked) => Ok(ToolOutcome::not_configured(
                "nenhuma conta de análise conectada",
            )),
            Err(e) => Ok(ToolOutcome::failed(e.to_string())),
        }
    }

    async fn generate_descriptions(&self, input: Value) -> AiResult<ToolOutcome> {
        let input: GenerateDescriptionsInput = Self::parse(input)?;
        let descriptions = generate::generate_descriptions(
            &self.router,
            &input.content,
            &input.platforms,
            input.tone.as_deref(),
            input.include_hashtags.unwrap_or(true),
        )
        .await?;

        Ok(ToolOutcome::ok(json!({
            "success": true,
            "descriptions": descriptions,
        })))
    }

    async fn search_web(&self, input: Value) -> AiResult<ToolOutcome> {
        let input: SearchWebInput = Self::parse(input)?;

        let Some(search) = &self.search else {
            return Ok(ToolOutcome::not_configured("pesquisa web não configurada"));
        };

        let max_results = input
            .max_results
            .map(|n| n as usize)
            .unwrap_or(SEARCH_RESULT_CAP)
            .min(SEARCH_RESULT_CAP);

        let results = search.search(&input.query, max_results, "basic").await?;
        Ok(ToolOutcome::ok(json!({
            "success": true,
            "results": results.results,
        })))
    }

    fn navigate(&self, input: Value) -> AiResult<ToolOutcome> {
        let input: NavigateInput = Self::parse(input)?;
        let page = input.page.to_lowercase();

        match PAGES.iter().find(|(token, _)| *token == page) {
            Some((_, url)) => Ok(ToolOutcome::ok(json!({"success": true, "url": url}))),
            None => Err(AiError::validation(format!("página desconhecida: {page}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn executor() -> ToolExecutor {
        ToolExecutor::new(Arc::new(ModelRouter::unconfigured()), None, None)
    }

    fn ctx() -> ToolContext {
        ToolContext {
            org_id: OrgId::from("org_1"),
            blog_id: None,
        }
    }

    #[tokio::test]
    async fn test_schedule_post_future_timestamp() {
        let future = (Utc::now() + Duration::hours(20)).to_rfc3339();
        let outcome = executor()
            .execute(
                "schedule_post",
                json!({"platform": "instagram", "content": "post", "scheduled_at": future}),
                &ctx(),
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["success"], true);
        assert!(outcome.result["post_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_schedule_post_past_timestamp_rejected() {
        let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
        let outcome = executor()
            .execute(
                "schedule_post",
                json!({"platform": "x", "content": "post", "scheduled_at": past}),
                &ctx(),
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.result["success"], false);
        let error = outcome.result["error"].as_str().unwrap();
        assert!(error.contains("no futuro"), "{error}");
    }

    #[tokio::test]
    async fn test_analytics_without_linkage_is_structured() {
        let outcome = executor().execute("get_analytics", json!({}), &ctx()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.result["not_configured"], true);
    }

    #[tokio::test]
    async fn test_navigate_known_and_unknown_pages() {
        let outcome = executor()
            .execute("navigate", json!({"page": "Calendar"}), &ctx())
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.result["url"], "/calendar");

        let outcome = executor()
            .execute("navigate", json!({"page": "nowhere"}), &ctx())
            .await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_unknown_tool_never_panics() {
        let outcome = executor().execute("rm_rf", json!({}), &ctx()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.result["success"], false);
    }

    #[tokio::test]
    async fn test_unconfigured_router_folds_into_result() {
        // generate_script with no LLM configured -> structured failure,
        // not an Err bubbling out of the turn
        let outcome = executor()
            .execute("generate_script", json!({"topic": "IA"}), &ctx())
            .await;
        assert!(!outcome.success);
        assert!(outcome.result["error"].as_str().unwrap().contains("Not configured"));
    }
}
