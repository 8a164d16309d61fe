use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::chat::{self, ChatMessage, ContentPart, MessageContent, Role};
use crate::models::ollama::{GenerateChunk, GenerateOptions, GenerateRequest};

// ============================================================================
// Message normalization
// ============================================================================

/// Flatten a multi-role conversation into a single prompt string.
///
/// Each recognized message becomes `"<Role>: <text>"`; messages are joined with a
/// blank line. Messages with roles other than system/user/assistant are dropped.
pub fn messages_to_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter_map(|msg| {
            let label = role_label(msg.role)?;
            Some(format!("{}: {}", label, content_text(msg.content.as_ref())))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn role_label(role: Role) -> Option<&'static str> {
    match role {
        Role::System => Some("System"),
        Role::User => Some("User"),
        Role::Assistant => Some("Assistant"),
        Role::Other => None,
    }
}

/// Resolve message content to plain text; absent content is empty.
pub fn content_text(content: Option<&MessageContent>) -> String {
    match content {
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Parts(parts)) => parts_text(parts),
        None => String::new(),
    }
}

/// Text of every `"text"` part joined by a single space; other part kinds are discarded.
fn parts_text(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .filter(|p| p.kind == "text")
        .map(|p| p.text.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Model mapping
// ============================================================================

/// Static caller-alias table. The first entry points at the configured default.
const BUILTIN_ALIASES: &[(&str, Option<&str>)] = &[
    (chat::DEFAULT_MODEL_ALIAS, None),
    ("gpt-4", Some("qwen2.5-coder:7b")),
    ("gpt-3.5-turbo", Some("qwen2.5-coder:7b")),
    ("claude", Some("Xibalba-Studio/thrawn-commander:latest")),
];

/// Total mapping from caller model ids to backend model ids.
#[derive(Debug, Clone)]
pub struct ModelMap {
    aliases: HashMap<String, String>,
    default_model: String,
}

impl ModelMap {
    pub fn new(default_model: impl Into<String>) -> Self {
        let default_model = default_model.into();
        let aliases = BUILTIN_ALIASES
            .iter()
            .map(|(alias, target)| {
                let target = target.unwrap_or(default_model.as_str());
                (alias.to_string(), target.to_string())
            })
            .collect();
        Self {
            aliases,
            default_model,
        }
    }

    /// Add or replace aliases; later entries win.
    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.aliases.extend(overrides);
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Backend model for `model`; unmapped ids fall back to the default model.
    pub fn resolve(&self, model: &str) -> &str {
        self.aliases
            .get(model)
            .map(String::as_str)
            .unwrap_or(self.default_model.as_str())
    }
}

/// Parse `"alias=backend;alias2=backend2"` into alias pairs.
///
/// Commas are accepted as separators too; entries without `=` or with an empty
/// side are skipped.
pub fn parse_model_overrides(raw: &str) -> Vec<(String, String)> {
    raw.split([';', ','])
        .filter_map(|entry| {
            let (alias, target) = entry.trim().split_once('=')?;
            let (alias, target) = (alias.trim(), target.trim());
            if alias.is_empty() || target.is_empty() {
                None
            } else {
                Some((alias.to_string(), target.to_string()))
            }
        })
        .collect()
}

// ============================================================================
// Request / response translation
// ============================================================================

/// Build the backend `generate` payload for a validated chat request.
pub fn to_generate_request(req: &chat::ChatRequest, models: &ModelMap) -> GenerateRequest {
    GenerateRequest {
        model: models.resolve(req.model()).to_string(),
        prompt: messages_to_prompt(&req.messages),
        stream: req.is_stream(),
        options: GenerateOptions {
            temperature: req.temperature(),
            num_predict: req.max_tokens(),
        },
    }
}

pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Wrap a complete backend body into a `chat.completion` response.
///
/// Missing token counts are treated as zero.
pub fn generate_to_chat_response(body: &GenerateChunk, caller_model: &str) -> chat::ChatResponse {
    let prompt_tokens = body.prompt_eval_count.unwrap_or(0);
    let completion_tokens = body.eval_count.unwrap_or(0);

    chat::ChatResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: caller_model.to_string(),
        choices: vec![chat::ChatChoice {
            index: 0,
            message: chat::ChatResponseMessage {
                role: "assistant".to_string(),
                content: body.response.clone(),
            },
            finish_reason: Some("stop".to_string()),
        }],
        usage: chat::ChatUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        },
    }
}

/// Map one backend chunk to a delta chunk. Chunks without text produce nothing.
pub fn generate_chunk_to_chat_chunk(
    chunk: &GenerateChunk,
    id: &str,
    created: u64,
    caller_model: &str,
) -> Option<chat::ChatChunk> {
    if chunk.response.is_empty() {
        return None;
    }
    Some(chat::ChatChunk {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created,
        model: caller_model.to_string(),
        choices: vec![chat::ChunkChoice {
            index: 0,
            delta: chat::ChunkDelta {
                content: chunk.response.clone(),
            },
            finish_reason: None,
        }],
    })
}
