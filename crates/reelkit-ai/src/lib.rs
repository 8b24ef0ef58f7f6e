//! Model routing, the AI assistant core and integration adapters.
//!
//! This crate provides:
//! - A provider-abstracted model router (gateway or direct vendor) with
//!   per-capability fallback chains
//! - The assistant: tool catalog, function-calling turn, confirmation
//!   gating
//! - Shared script/description generation used by tools and handlers
//! - Thin adapters for search, analytics reads and avatar rendering

pub mod adapters;
pub mod assistant;
pub mod error;
pub mod executor;
pub mod generate;
pub mod router;
pub mod tools;

pub use assistant::{Assistant, ChatRequest};
pub use error::{AiError, AiResult};
pub use executor::{ToolContext, ToolExecutor, ToolOutcome};
pub use router::{
    Capability, ChatMessage, ChatOutcome, ContentBlock, GatewayBackend, GeminiBackend, Generation,
    LlmBackend, ModelRouter, ToolSpec,
};
