//! Assistant chat turns and tool call records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Record of a tool the model invoked during a turn.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolCall {
    /// Tool name as emitted by the model
    pub name: String,
    /// Structured arguments
    pub arguments: serde_json::Value,
    /// Tool output (None when the tool was not executed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Whether the tool body actually ran
    pub executed: bool,
    /// Whether this tool needs user confirmation before taking effect
    pub requires_confirmation: bool,
}

/// Response for one assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChatResponse {
    /// Assistant text shown to the user
    pub message: String,
    /// Tools invoked during the turn, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// True when any invoked tool is confirmation-gated
    pub requires_confirmation: bool,
    /// Total tokens reported by the model, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_turn_roles() {
        let turn = ChatTurn::user("agende para amanhã 18h");
        assert_eq!(turn.role, ChatRole::User);
        let turn = ChatTurn::assistant("Agendado.");
        assert_eq!(turn.role, ChatRole::Assistant);
    }

    #[test]
    fn test_tool_call_serde() {
        let call = ToolCall {
            name: "schedule_post".to_string(),
            arguments: serde_json::json!({"platform": "instagram"}),
            result: None,
            executed: false,
            requires_confirmation: true,
        };
        let json = serde_json::to_string(&call).unwrap();
        assert!(!json.contains("\"result\""));
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "schedule_post");
        assert!(back.requires_confirmation);
    }
}
