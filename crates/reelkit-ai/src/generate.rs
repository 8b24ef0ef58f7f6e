//! Shared content generation.
//!
//! Both the REST handlers and the assistant tools call into here, so the
//! assistant never re-enters handler code (no cycles).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reelkit_models::{Platform, PlatformDescription};

use crate::adapters::search::SearchClient;
use crate::error::{AiError, AiResult};
use crate::router::{Capability, ModelRouter};

const DESCRIPTION_MAX_TOKENS: u32 = 1024;
const SCRIPT_MAX_TOKENS: u32 = 2048;

/// How many research snippets feed the script prompt.
const RESEARCH_RESULTS: usize = 5;

/// A generated script with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub script: String,
    /// Model that actually answered
    pub model: String,
    pub tokens_used: Option<u32>,
    /// Source URLs the research contributed
    #[serde(default)]
    pub sources: Vec<String>,
}

fn parse_platform(name: &str) -> AiResult<Platform> {
    serde_json::from_value(serde_json::Value::String(name.to_lowercase()))
        .map_err(|_| AiError::validation(format!("unknown platform: {name}")))
}

/// Generate one description per requested platform, each within the
/// platform's character limit.
pub async fn generate_descriptions(
    router: &ModelRouter,
    content: &str,
    platforms: &[String],
    tone: Option<&str>,
    include_hashtags: bool,
) -> AiResult<HashMap<String, PlatformDescription>> {
    if platforms.is_empty() {
        return Err(AiError::validation("no platforms requested"));
    }

    let tone = tone.unwrap_or("profissional");
    let mut out = HashMap::new();

    for name in platforms {
        let platform = parse_platform(name)?;
        let max_chars = platform.max_chars();

        let hashtag_clause = if include_hashtags {
            "Inclua de 3 a 5 hashtags relevantes ao final."
        } else {
            "Não inclua hashtags."
        };

        let prompt = format!(
            "Escreva uma descrição de publicação para {platform} com tom {tone}, \
             com no máximo {max_chars} caracteres. {hashtag_clause}\n\n\
             Conteúdo de referência:\n{content}"
        );

        let generation = router
            .generate(Capability::Description, &prompt, DESCRIPTION_MAX_TOKENS)
            .await?;

        let text = truncate_at_word(generation.text.trim(), max_chars);
        let hashtags = extract_hashtags(&text);

        debug!(
            platform = %platform,
            chars = text.chars().count(),
            model = %generation.model,
            "Generated description"
        );

        out.insert(
            platform.as_str().to_string(),
            PlatformDescription {
                character_count: text.chars().count(),
                max_characters: max_chars,
                text,
                hashtags,
            },
        );
    }

    Ok(out)
}

/// Generate a short-video script, optionally grounded on web research.
pub async fn generate_script_from_research(
    router: &ModelRouter,
    search: Option<&SearchClient>,
    topic: &str,
    duration_seconds: u32,
    tone: Option<&str>,
) -> AiResult<GeneratedScript> {
    let tone = tone.unwrap_or("profissional");

    let (research_block, sources) = match search {
        Some(client) => match client.search(topic, RESEARCH_RESULTS, "basic").await {
            Ok(results) => {
                let sources: Vec<String> =
                    results.results.iter().map(|h| h.url.clone()).collect();
                let block = results
                    .results
                    .iter()
                    .map(|h| format!("- {} ({})\n  {}", h.title, h.url, h.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                (block, sources)
            }
            // Research is an enrichment; a search outage must not block
            // script generation.
            Err(e) => {
                debug!(error = %e, "Search unavailable, generating without research");
                (String::new(), Vec::new())
            }
        },
        None => (String::new(), Vec::new()),
    };

    let research_clause = if research_block.is_empty() {
        String::new()
    } else {
        format!("\n\nPesquisa recente sobre o tema:\n{research_block}")
    };

    let prompt = format!(
        "Escreva um roteiro de vídeo curto de aproximadamente {duration_seconds} segundos \
         sobre \"{topic}\", com tom {tone}. Estruture em gancho, desenvolvimento e chamada \
         para ação, com marcações de cena.{research_clause}"
    );

    let generation = router
        .generate(Capability::Script, &prompt, SCRIPT_MAX_TOKENS)
        .await?;

    info!(topic, model = %generation.model, "Generated script");

    Ok(GeneratedScript {
        script: generation.text,
        model: generation.model,
        tokens_used: generation.tokens_used,
        sources,
    })
}

/// Cap `text` at `max_chars`, backing up to the last word boundary.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let capped: String = text.chars().take(max_chars).collect();

    // A cut landing on a word boundary needs no backtracking.
    let next_is_boundary = text
        .chars()
        .nth(max_chars)
        .map_or(true, char::is_whitespace);
    if next_is_boundary {
        return capped.trim_end().to_string();
    }

    match capped.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => capped[..idx].trim_end().to_string(),
        _ => capped,
    }
}

/// Collect `#hashtag` tokens in order of appearance, deduplicated.
fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for token in text.split_whitespace() {
        if let Some(tag) = token.strip_prefix('#') {
            let tag: String = tag
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !tag.is_empty() {
                let tag = format!("#{tag}");
                if !seen.contains(&tag) {
                    seen.push(tag);
                }
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{ChatMessage, ChatOutcome, ContentBlock, Generation, LlmBackend, ToolSpec};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedBackend {
        text: String,
    }

    #[async_trait]
    impl LlmBackend for FixedBackend {
        async fn generate(
            &self,
            model: &str,
            _prompt: &str,
            _max_tokens: u32,
        ) -> AiResult<Generation> {
            Ok(Generation {
                text: self.text.clone(),
                model: model.to_string(),
                tokens_used: Some(5),
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
                blocks: vec![ContentBlock::Text(self.text.clone())],
                model: model.to_string(),
                tokens_used: Some(5),
            })
        }
    }

    fn router_with(text: &str) -> ModelRouter {
        let chain = vec!["m1".to_string()];
        let chains = [
            (Capability::Description, chain.clone()),
            (Capability::Script, chain),
        ]
        .into_iter()
        .collect();
        ModelRouter::new(
            Arc::new(FixedBackend {
                text: text.to_string(),
            }),
            chains,
        )
    }

    #[tokio::test]
    async fn test_descriptions_respect_platform_limits() {
        let long_text = "palavra ".repeat(100);
        let router = router_with(&long_text);

        let out = generate_descriptions(
            &router,
            "lançamento do produto",
            &["x".to_string(), "linkedin".to_string()],
            Some("profissional"),
            true,
        )
        .await
        .unwrap();

        assert_eq!(out.len(), 2);
        assert!(out["x"].character_count <= 280);
        assert!(out["linkedin"].character_count <= 3000);
        assert_eq!(out["x"].max_characters, 280);
        // Word-boundary truncation never splits a word
        assert!(!out["x"].text.ends_with("palavr"));
    }

    #[tokio::test]
    async fn test_unknown_platform_is_validation_error() {
        let router = router_with("texto");
        let err = generate_descriptions(&router, "c", &["orkut".to_string()], None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_script_without_search_client() {
        let router = router_with("CENA 1: gancho...");
        let script = generate_script_from_research(&router, None, "IA no marketing", 60, None)
            .await
            .unwrap();
        assert_eq!(script.script, "CENA 1: gancho...");
        assert!(script.sources.is_empty());
    }

    #[test]
    fn test_truncate_at_word() {
        assert_eq!(truncate_at_word("abc def", 100), "abc def");
        assert_eq!(truncate_at_word("abc def ghi", 7), "abc def");
        assert_eq!(truncate_at_word("abc def ghi", 9), "abc def");
        // No whitespace inside the cap: hard cut
        assert_eq!(truncate_at_word("abcdefghij", 4), "abcd");
    }

    #[test]
    fn test_extract_hashtags() {
        let tags = extract_hashtags("Lançamento! #video #marketing e #video de novo #ia2026.");
        assert_eq!(tags, vec!["#video", "#marketing", "#ia2026"]);
    }
}
