//! Shared types for the agent client.
//!
//! These mirror the OpenAI Chat Completions request shape. Fields the relay
//! does not interpret (sampling parameters, model name, per-message extras)
//! are captured in `extra` and serialized back out, so the request reaches the
//! model endpoint as the caller sent it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::errors::InvalidRequest;

// ─── Request Types ───────────────────────────────────────────────────────────

/// Inbound chat request, forwarded to the model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single message in the conversation.
///
/// `content` keeps absent (`None`) apart from an explicit `null`
/// (`Some(None)`), as sent by assistant turns that carry `tool_calls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<Option<MessageContent>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Message role.
///
/// `function` is what the chat panel uses to replay desktop tool results back
/// to the model on the next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
    Tool,
}

/// Message content: plain text, or a list of typed parts (text, image refs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of a multi-part message (`{"type": "text", "text": ...}`,
/// `{"type": "image_url", ...}`). Everything but `type` is passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<MessageContent>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<MessageContent>::deserialize(deserializer).map(Some)
}

impl ChatRequest {
    /// Parse and validate a raw request body.
    ///
    /// The body must be a JSON object with a non-empty `messages` list whose
    /// entries each carry a known `role`.
    pub fn from_json(body: &[u8]) -> Result<Self, InvalidRequest> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| InvalidRequest::new(format!("request body is not valid JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| InvalidRequest::new("request body must be a JSON object"))?;

        match object.get("messages") {
            None | Some(Value::Null) => {
                return Err(InvalidRequest::new("missing `messages`"));
            }
            Some(Value::Array(messages)) if messages.is_empty() => {
                return Err(InvalidRequest::new("`messages` must not be empty"));
            }
            Some(Value::Array(_)) => {}
            Some(_) => return Err(InvalidRequest::new("`messages` must be a list")),
        }

        serde_json::from_value(value)
            .map_err(|e| InvalidRequest::new(format!("invalid message: {e}")))
    }

    /// Number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// The model's chosen reply for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub content: String,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
