//! Chat Completions request/response models as seen by the calling client.

use serde::{Deserialize, Deserializer, Serialize};

/// Model alias assumed when the caller omits `model`.
pub const DEFAULT_MODEL_ALIAS: &str = "xibalba-filtered-model";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: i64 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[default]
    User,
    Assistant,
    /// Any role the bridge does not forward (tool, function, developer, ...).
    #[serde(other)]
    Other,
}

/// Accept any JSON value as a role; anything but a known role name is `Other`.
fn lenient_role<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value.as_str() {
        Some("system") => Role::System,
        Some("user") => Role::User,
        Some("assistant") => Role::Assistant,
        _ => Role::Other,
    })
}

/// One typed content part, e.g. `{"type": "text", "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

/// Message content is either a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.into())),
        }
    }
}

/// Inbound Chat Completions request. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
}

impl ChatRequest {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL_ALIAS)
    }

    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> i64 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponseMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Non-streaming `chat.completion` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: ChatUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

/// Streaming `chat.completion.chunk` body, one per SSE event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn applies_request_defaults() {
        let req: ChatRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();
        assert_eq!(req.model(), DEFAULT_MODEL_ALIAS);
        assert!(!req.is_stream());
        assert_eq!(req.temperature(), 0.7);
        assert_eq!(req.max_tokens(), 4000);
    }

    #[test]
    fn parses_parts_and_unknown_roles() {
        let req: ChatRequest = serde_json::from_value(json!({
            "model": "gpt-4",
            "messages": [
                {"role": "tool", "content": "ignored"},
                {"role": "user", "content": [
                    {"type": "text", "text": "look"},
                    {"type": "image_url", "image_url": {"url": "http://x/y.png"}}
                ]},
                {"content": null}
            ],
            "stream": true,
            "top_p": 0.9
        }))
        .unwrap();

        assert_eq!(req.messages[0].role, Role::Other);
        match &req.messages[1].content {
            Some(MessageContent::Parts(parts)) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[1].kind, "image_url");
                assert!(parts[1].text.is_none());
            }
            other => panic!("expected parts, got {:?}", other),
        }
        assert_eq!(req.messages[2].role, Role::User);
        assert!(req.messages[2].content.is_none());
        assert!(req.is_stream());
    }

    #[test]
    fn tolerates_odd_roles_and_unbounded_max_tokens() {
        let req: ChatRequest = serde_json::from_value(json!({
            "messages": [
                {"role": 3, "content": "numeric role"},
                {"role": null, "content": "null role"},
                {"role": {"name": "x"}, "content": "object role"},
                {"role": "assistant", "content": "kept"}
            ],
            "max_tokens": -1
        }))
        .unwrap();

        assert_eq!(req.messages[0].role, Role::Other);
        assert_eq!(req.messages[1].role, Role::Other);
        assert_eq!(req.messages[2].role, Role::Other);
        assert_eq!(req.messages[3].role, Role::Assistant);
        assert_eq!(req.max_tokens(), -1);
    }

    #[test]
    fn chunk_serializes_null_finish_reason() {
        let chunk = ChatChunk {
            id: "chatcmpl-1".into(),
            object: "chat.completion.chunk".into(),
            created: 1,
            model: "gpt-4".into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: "hi".into(),
                },
                finish_reason: None,
            }],
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert!(value["choices"][0]["finish_reason"].is_null());
        assert_eq!(value["choices"][0]["delta"]["content"], "hi");
    }
}
