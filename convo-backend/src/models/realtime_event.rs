use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TableName;
use crate::text::ellipsize;

/// Kind of row change reported by the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn from_str(s: &str) -> Option<ChangeType> {
        match s.to_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A change notification captured by the realtime monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub id: String,
    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub table: TableName,
    pub event_type: ChangeType,
    pub payload: Value,
}

const MESSAGE_PREVIEW_CHARS: usize = 100;
const TOOL_RESULT_PREVIEW_CHARS: usize = 80;

impl RealtimeEvent {
    /// One-line summary of the changed row, or `None` when the payload
    /// carries nothing worth showing (e.g. a DELETE without old values).
    pub fn preview(&self) -> Option<String> {
        let field = |name: &str| self.payload.get(name).and_then(Value::as_str);
        let mut parts: Vec<String> = Vec::new();

        match self.table {
            TableName::ConversationMessages => {
                if let Some(role) = field("role") {
                    parts.push(role.to_string());
                }
                if let Some(content) = field("content") {
                    parts.push(ellipsize(content, MESSAGE_PREVIEW_CHARS));
                }
            }
            TableName::ConversationSessions => {
                if self.payload.as_object().map(|o| o.is_empty()).unwrap_or(true) {
                    return None;
                }
                if let Some(model) = field("wake_word_model") {
                    parts.push(format!("Wake word: {}", model));
                }
                let mut state = if field("ended_at").is_some() {
                    "Session ended".to_string()
                } else {
                    "Session started".to_string()
                };
                if let Some(user_id) = field("user_id") {
                    state.push_str(&format!(" • User: {}", user_id));
                }
                parts.push(state);
            }
            TableName::ToolCalls => {
                if let Some(tool) = field("tool_name") {
                    parts.push(tool.to_string());
                }
                if let Some(duration) = self.payload.get("duration_ms").and_then(Value::as_f64) {
                    parts.push(format!("{:.0}ms", duration));
                }
                if let Some(result) = field("result") {
                    parts.push(ellipsize(result, TOOL_RESULT_PREVIEW_CHARS));
                }
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}
