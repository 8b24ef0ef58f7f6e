//! Assistant tool catalog.
//!
//! Ten tools the model can invoke as structured calls. The three
//! scheduling tools mutate the posting calendar and are
//! confirmation-gated: the turn executes them but the response flags
//! `requires_confirmation` so the front-end asks before committing.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::router::ToolSpec;

/// Input for `generate_script`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateScriptInput {
    /// Topic to research and write about
    pub topic: String,
    /// Target video duration in seconds
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    /// Writing tone, e.g. "profissional", "descontraído"
    #[serde(default)]
    pub tone: Option<String>,
}

/// Input for `regenerate_script`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegenerateScriptInput {
    /// Topic of the script being regenerated
    pub topic: String,
    /// What to change relative to the previous version
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

/// Input for `schedule_post`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchedulePostInput {
    /// Target platform (linkedin, x, instagram, tiktok, facebook, youtube)
    pub platform: String,
    /// Post content
    pub content: String,
    /// RFC 3339 timestamp; must be strictly in the future
    pub scheduled_at: String,
    /// Video to attach, when any
    #[serde(default)]
    pub video_id: Option<String>,
}

/// Input for `reschedule_post`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReschedulePostInput {
    pub post_id: String,
    /// RFC 3339 timestamp; must be strictly in the future
    pub scheduled_at: String,
}

/// Input for `cancel_post`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CancelPostInput {
    pub post_id: String,
}

/// Input for `get_analytics`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetAnalyticsInput {
    #[serde(default)]
    pub platform: Option<String>,
    /// RFC 3339 range start
    #[serde(default)]
    pub from: Option<String>,
    /// RFC 3339 range end
    #[serde(default)]
    pub to: Option<String>,
}

/// Input for `get_best_times`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetBestTimesInput {
    #[serde(default)]
    pub platform: Option<String>,
}

/// Input for `generate_descriptions`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateDescriptionsInput {
    /// Source content the descriptions are written from
    pub content: String,
    /// Target platforms
    pub platforms: Vec<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub include_hashtags: Option<bool>,
}

/// Input for `search_web`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchWebInput {
    pub query: String,
    /// Capped at 5
    #[serde(default)]
    pub max_results: Option<u32>,
}

/// Input for `navigate`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NavigateInput {
    /// Page token (dashboard, calendar, videos, editor, analytics, settings)
    pub page: String,
}

/// One registered tool.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub requires_confirmation: bool,
    pub input_schema: Value,
}

impl ToolDef {
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema.clone(),
        }
    }
}

fn schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| Value::Object(Default::default()))
}

/// The full catalog, in registration order.
pub fn catalog() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "generate_script",
            description: "Gera um roteiro de vídeo curto a partir de pesquisa na web sobre um tópico",
            requires_confirmation: false,
            input_schema: schema::<GenerateScriptInput>(),
        },
        ToolDef {
            name: "regenerate_script",
            description: "Regenera um roteiro existente incorporando o feedback do usuário",
            requires_confirmation: false,
            input_schema: schema::<RegenerateScriptInput>(),
        },
        ToolDef {
            name: "schedule_post",
            description: "Agenda uma publicação em uma plataforma para uma data futura",
            requires_confirmation: true,
            input_schema: schema::<SchedulePostInput>(),
        },
        ToolDef {
            name: "reschedule_post",
            description: "Move uma publicação agendada para uma nova data futura",
            requires_confirmation: true,
            input_schema: schema::<ReschedulePostInput>(),
        },
        ToolDef {
            name: "cancel_post",
            description: "Cancela uma publicação agendada",
            requires_confirmation: true,
            input_schema: schema::<CancelPostInput>(),
        },
        ToolDef {
            name: "get_analytics",
            description: "Consulta métricas de desempenho das publicações",
            requires_confirmation: false,
            input_schema: schema::<GetAnalyticsInput>(),
        },
        ToolDef {
            name: "get_best_times",
            description: "Consulta os melhores horários de publicação por plataforma",
            requires_confirmation: false,
            input_schema: schema::<GetBestTimesInput>(),
        },
        ToolDef {
            name: "generate_descriptions",
            description: "Gera descrições específicas por plataforma para um conteúdo",
            requires_confirmation: false,
            input_schema: schema::<GenerateDescriptionsInput>(),
        },
        ToolDef {
            name: "search_web",
            description: "Pesquisa na web e retorna até 5 resultados resumidos",
            requires_confirmation: false,
            input_schema: schema::<SearchWebInput>(),
        },
        ToolDef {
            name: "navigate",
            description: "Leva o usuário para uma página do aplicativo",
            requires_confirmation: false,
            input_schema: schema::<NavigateInput>(),
        },
    ]
}

/// Specs handed to the router for function calling.
pub fn specs() -> Vec<ToolSpec> {
    catalog().iter().map(ToolDef::spec).collect()
}

/// Whether a tool is confirmation-gated. Unknown names are not.
pub fn requires_confirmation(name: &str) -> bool {
    catalog()
        .iter()
        .any(|t| t.name == name && t.requires_confirmation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_ten_tools() {
        let names: Vec<_> = catalog().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), 10);
        for expected in [
            "generate_script",
            "regenerate_script",
            "schedule_post",
            "reschedule_post",
            "cancel_post",
            "get_analytics",
            "get_best_times",
            "generate_descriptions",
            "search_web",
            "navigate",
        ] {
            assert!(names.contains(&expected), "{expected} missing");
        }
    }

    #[test]
    fn test_confirmation_gated_tools() {
        assert!(requires_confirmation("schedule_post"));
        assert!(requires_confirmation("reschedule_post"));
        assert!(requires_confirmation("cancel_post"));
        assert!(!requires_confirmation("search_web"));
        assert!(!requires_confirmation("unknown_tool"));
    }

    #[test]
    fn test_schemas_are_objects_with_properties() {
        for tool in catalog() {
            let schema = &tool.input_schema;
            assert!(
                schema.get("properties").is_some() || schema.get("type").is_some(),
                "{} schema looks empty",
                tool.name
            );
        }
    }

    #[test]
    fn test_schedule_input_deserializes() {
        let input: SchedulePostInput = serde_json::from_value(serde_json::json!({
            "platform": "instagram",
            "content": "novo vídeo no ar",
            "scheduled_at": "2026-08-05T18:00:00Z"
        }))
        .unwrap();
        assert_eq!(input.platform, "instagram");
        assert!(input.video_id.is_none());
    }
}
