//! Single-turn assistant orchestrator.
//!
//! Composes a page-aware system prompt, replays bounded history, runs the
//! router with the tool catalog and folds the response blocks in order.
//! A turn never fails because one of its tools failed.

use std::sync::Arc;

use tracing::{debug, info};

use reelkit_core::sanitize::{
    clean_text, MAX_CONTEXT_LEN, MAX_HISTORY_ENTRY_LEN, MAX_MESSAGE_LEN,
};
use reelkit_models::{ChatResponse, ChatTurn, OrgId, ToolCall};

use crate::error::AiResult;
use crate::executor::{ToolContext, ToolExecutor};
use crate::router::{Capability, ChatMessage, ContentBlock, ModelRouter};
use crate::tools;

/// History entries replayed into the prompt.
const MAX_HISTORY: usize = 50;

const MAX_TURN_TOKENS: u32 = 1024;

/// Reply used when the model only emitted tool calls.
const ACTION_PERFORMED: &str = "Ação realizada.";

const PERSONALITY: &str = "Você é o assistente do ReelKit, um estúdio de automação de \
conteúdo para redes sociais. Responda em português, de forma direta e prestativa. \
Use as ferramentas disponíveis quando o pedido exigir uma ação; nunca invente \
resultados de ferramentas.";

/// Fixed page -> prompt addendum map.
const PAGE_CONTEXT: &[(&str, &str)] = &[
    (
        "dashboard",
        "O usuário está no painel geral, vendo um resumo de vídeos e publicações.",
    ),
    (
        "calendar",
        "O usuário está no calendário editorial; pedidos de agendamento referem-se a ele.",
    ),
    (
        "videos",
        "O usuário está na biblioteca de vídeos enviados e processados.",
    ),
    (
        "editor",
        "O usuário está no editor de vídeo, com corte, legendas e remoção de silêncio.",
    ),
    (
        "analytics",
        "O usuário está na página de métricas de desempenho das publicações.",
    ),
    (
        "settings",
        "O usuário está nas configurações da organização e integrações.",
    ),
];

/// One inbound chat turn.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub org_id: OrgId,
    pub blog_id: Option<String>,
    /// Current user message
    pub message: String,
    /// Page token the front-end reports
    pub page: Option<String>,
    /// Caller-supplied additional context
    pub context: Option<String>,
    /// Prior turns, oldest first
    pub history: Vec<ChatTurn>,
}

/// The assistant core.
pub struct Assistant {
    router: Arc<ModelRouter>,
    executor: ToolExecutor,
}

impl Assistant {
    pub fn new(router: Arc<ModelRouter>, executor: ToolExecutor) -> Self {
        Self { router, executor }
    }

    fn system_prompt(page: Option<&str>, context: Option<&str>) -> String {
        let mut prompt = PERSONALITY.to_string();

        if let Some(page) = page {
            let token = page.to_lowercase();
            if let Some((_, addendum)) = PAGE_CONTEXT.iter().find(|(t, _)| *t == token) {
                prompt.push_str("\n\n");
                prompt.push_str(addendum);
            }
        }

        if let Some(context) = context {
            let cleaned = clean_text(context, MAX_CONTEXT_LEN);
            if !cleaned.trim().is_empty() {
                prompt.push_str("\n\nContexto adicional:\n");
                prompt.push_str(&cleaned);
            }
        }

        prompt
    }

    fn build_messages(history: &[ChatTurn], message: &str) -> Vec<ChatMessage> {
        let start = history.len().saturating_sub(MAX_HISTORY);
        let mut messages: Vec<ChatMessage> = history[start..]
            .iter()
            .map(|turn| ChatMessage {
                role: turn.role,
                content: clean_text(&turn.content, MAX_HISTORY_ENTRY_LEN),
            })
            .collect();

        messages.push(ChatMessage::user(clean_text(message, MAX_MESSAGE_LEN)));
        messages
    }

    /// Run one turn.
    pub async fn chat(&self, request: ChatRequest) -> AiResult<ChatResponse> {
        let system = Self::system_prompt(request.page.as_deref(), request.context.as_deref());
        let messages = Self::build_messages(&request.history, &request.message);
        let specs = tools::specs();

        debug!(
            org_id = %request.org_id,
            history = messages.len() - 1,
            "Running assistant turn"
        );

        let outcome = self
            .router
            .chat(Capability::Assistant, &system, &messages, &specs, MAX_TURN_TOKENS)
            .await?;

        let ctx = ToolContext {
            org_id: request.org_id.clone(),
            blog_id: request.blog_id.clone(),
        };

        let mut message = String::new();
        let mut tool_calls = Vec::new();
        let mut requires_confirmation = false;

        for block in outcome.blocks {
            match block {
                ContentBlock::Text(text) => message.push_str(&text),
                ContentBlock::ToolUse { name, input } => {
                    let gated = tools::requires_confirmation(&name);
                    if gated {
                        requires_confirmation = true;
                    }

                    let executed = self.executor.execute(&name, input.clone(), &ctx).await;
                    tool_calls.push(ToolCall {
                        name,
                        arguments: input,
                        result: Some(executed.result),
                        executed: executed.success,
                        requires_confirmation: gated,
                    });
                }
            }
        }

        if message.is_empty() && tool_calls.iter().any(|c| c.executed) {
            message = ACTION_PERFORMED.to_string();
        }

        info!(
            org_id = %request.org_id,
            tools = tool_calls.len(),
            requires_confirmation,
            "Assistant turn complete"
        );

        Ok(ChatResponse {
            message,
            tool_calls,
            requires_confirmation,
            tokens_used: outcome.tokens_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use reelkit_models::ChatRole;

    use crate::error::AiResult;
    use crate::router::{ChatOutcome, Generation, LlmBackend, ToolSpec};

    struct ScriptedBackend {
        blocks: Vec<ContentBlock>,
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate(
            &self,
            model: &str,
            _prompt: &str,
            _max_tokens: u32,
        ) -> AiResult<Generation> {
            Ok(Generation {
                text: "texto".to_string(),
                model: model.to_string(),
                tokens_used: None,
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
            Ok(ChatOutcome {
                blocks: self.blocks.clone(),
                model: model.to_string(),
                tokens_used: Some(77),
            })
        }
    }

    fn assistant_with(blocks: Vec<ContentBlock>) -> Assistant {
        let chains = [(Capability::Assistant, vec!["m".to_string()])]
            .into_iter()
            .collect();
        let router = Arc::new(ModelRouter::new(Arc::new(ScriptedBackend { blocks }), chains));
        let executor = ToolExecutor::new(Arc::new(ModelRouter::unconfigured()), None, None);
        Assistant::new(router, executor)
    }

    fn request(message: &str, page: Option<&str>) -> ChatRequest {
        ChatRequest {
            org_id: OrgId::from("org_1"),
            blog_id: None,
            message: message.to_string(),
            page: page.map(String::from),
            context: None,
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_schedule_tool_sets_confirmation_flag() {
        let future = (chrono::Utc::now() + chrono::Duration::days(1)).to_rfc3339();
        let assistant = assistant_with(vec![ContentBlock::ToolUse {
            name: "schedule_post".to_string(),
            input: json!({
                "platform": "instagram",
                "content": "novo vídeo",
                "scheduled_at": future,
            }),
        }]);

        let response = assistant
            .chat(request("agende para amanhã 18h", Some("calendar")))
            .await
            .unwrap();

        assert!(response.requires_confirmation);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "schedule_post");
        assert!(response.tool_calls[0].executed);
        // No text block, but an executed tool: generic action message
        assert_eq!(response.message, ACTION_PERFORMED);
        assert_eq!(response.tokens_used, Some(77));
    }

    #[tokio::test]
    async fn test_past_schedule_executes_false_with_error() {
        let past = (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339();
        let assistant = assistant_with(vec![ContentBlock::ToolUse {
            name: "schedule_post".to_string(),
            input: json!({
                "platform": "x",
                "content": "post",
                "scheduled_at": past,
            }),
        }]);

        let response = assistant.chat(request("agende para ontem", None)).await.unwrap();

        // Still confirmation-gated even though the tool rejected the input
        assert!(response.requires_confirmation);
        assert!(!response.tool_calls[0].executed);
        let result = response.tool_calls[0].result.as_ref().unwrap();
        assert!(result["error"].as_str().unwrap().contains("no futuro"));
    }

    #[tokio::test]
    async fn test_text_and_tool_blocks_fold_in_order() {
        let assistant = assistant_with(vec![
            ContentBlock::Text("Claro, levando você ".to_string()),
            ContentBlock::ToolUse {
                name: "navigate".to_string(),
                input: json!({"page": "videos"}),
            },
            ContentBlock::Text("para a biblioteca.".to_string()),
        ]);

        let response = assistant.chat(request("abra meus vídeos", None)).await.unwrap();

        assert_eq!(response.message, "Claro, levando você para a biblioteca.");
        assert!(!response.requires_confirmation);
        assert_eq!(response.tool_calls[0].result.as_ref().unwrap()["url"], "/videos");
    }

    #[tokio::test]
    async fn test_failed_tool_does_not_fail_turn() {
        let assistant = assistant_with(vec![ContentBlock::ToolUse {
            name: "get_analytics".to_string(),
            input: json!({}),
        }]);

        let response = assistant.chat(request("como estão as métricas?", None)).await.unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert!(!response.tool_calls[0].executed);
        let result = response.tool_calls[0].result.as_ref().unwrap();
        assert_eq!(result["not_configured"], true);
        // No executed tool and no text: message stays empty
        assert!(response.message.is_empty());
    }

    #[test]
    fn test_system_prompt_composition() {
        let prompt = Assistant::system_prompt(Some("calendar"), Some("cliente: Padaria Sol"));
        assert!(prompt.contains("calendário editorial"));
        assert!(prompt.contains("Padaria Sol"));

        let bare = Assistant::system_prompt(None, None);
        assert!(bare.contains("assistente do ReelKit"));
        assert!(!bare.contains("Contexto adicional"));
    }

    #[test]
    fn test_history_is_bounded() {
        let history: Vec<ChatTurn> = (0..120)
            .map(|i| {
                if i % 2 == 0 {
                    ChatTurn::user(format!("pergunta {i}"))
                } else {
                    ChatTurn::assistant(format!("resposta {i}"))
                }
            })
            .collect();

        let messages = Assistant::build_messages(&history, "última pergunta");
        assert_eq!(messages.len(), MAX_HISTORY + 1);
        assert_eq!(messages.last().unwrap().content, "última pergunta");
        // Oldest surviving entry is number 70
        assert_eq!(messages[0].content, "pergunta 70");
        assert_eq!(messages[0].role, ChatRole::User);
    }

    #[test]
    fn test_control_bytes_stripped_from_prompt_inputs() {
        let messages = Assistant::build_messages(&[], "oi\x00\x1b[2Jmundo");
        assert_eq!(messages[0].content, "oi[2Jmundo");
    }
}
