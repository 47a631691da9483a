use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::{empty_object, ToolCall};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<MessageRole> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single utterance within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: i64,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_is_final")]
    pub is_final: bool,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
}

fn default_is_final() -> bool {
    true
}

/// A message together with the tool calls it triggered
#[derive(Debug, Clone, Serialize)]
pub struct MessageWithToolCalls {
    #[serde(flatten)]
    pub message: ConversationMessage,
    pub tool_calls: Vec<ToolCall>,
}

/// Insert payload for a new message
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub is_final: bool,
    pub confidence: Option<f64>,
    pub metadata: Value,
}

/// Message fields shared by `POST /api/messages` and the webhook
#[derive(Debug, Default, Deserialize)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_key: Option<String>,
    #[serde(default)]
    pub console_token: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_final: Option<bool>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Why a message request could not be turned into an insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRequestError {
    MissingFields,
    InvalidRole(String),
}

impl CreateMessageRequest {
    /// True when session id, role and content are all present and non-empty
    pub fn has_message_fields(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().map(|s| !s.is_empty()).unwrap_or(false);
        present(&self.session_id) && present(&self.role) && present(&self.content)
    }

    /// Build the insert payload. `console_token` is folded into the metadata
    /// when `tag_console_token` is set so realtime watchers can filter on it.
    pub fn into_new_message(
        self,
        tag_console_token: bool,
    ) -> Result<NewMessage, MessageRequestError> {
        if !self.has_message_fields() {
            return Err(MessageRequestError::MissingFields);
        }

        let role_str = self.role.unwrap_or_default();
        let role = MessageRole::from_str(&role_str)
            .ok_or(MessageRequestError::InvalidRole(role_str))?;

        let mut metadata = match self.metadata {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if tag_console_token {
            metadata.insert(
                "console_token".to_string(),
                self.console_token.map(Value::String).unwrap_or(Value::Null),
            );
        }

        Ok(NewMessage {
            session_id: self.session_id.unwrap_or_default(),
            role,
            content: self.content.unwrap_or_default(),
            is_final: self.is_final.unwrap_or(true),
            confidence: self.confidence,
            metadata: Value::Object(metadata),
        })
    }
}

/// Attach tool calls to the messages they belong to, keeping each message's
/// calls in the order given.
pub fn attach_tool_calls(
    messages: Vec<ConversationMessage>,
    tool_calls: Vec<ToolCall>,
) -> Vec<MessageWithToolCalls> {
    let mut by_message: HashMap<i64, Vec<ToolCall>> = HashMap::new();
    for call in tool_calls {
        by_message.entry(call.message_id).or_default().push(call);
    }

    messages
        .into_iter()
        .map(|message| {
            let tool_calls = by_message.remove(&message.id).unwrap_or_default();
            MessageWithToolCalls { message, tool_calls }
        })
        .collect()
}
