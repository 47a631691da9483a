use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::empty_object;

/// A conversation session as stored in `conversation_sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    #[serde(with = "super::timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "super::timestamp::option")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub wake_word_model: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_id: String,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_input_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_output_tokens: Option<i64>,
}

impl ConversationSession {
    /// Case-insensitive match on id, user id and wake word model
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        if needle.is_empty() {
            return true;
        }

        self.id.to_lowercase().contains(&needle)
            || self.user_id.to_lowercase().contains(&needle)
            || self
                .wake_word_model
                .as_deref()
                .map(|m| m.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// Older rows may hold `user_id: null`
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Insert payload for a new session
#[derive(Debug, Clone, Serialize)]
pub struct NewSession {
    pub wake_word_model: Option<String>,
    pub user_id: String,
    pub metadata: Value,
}

/// Request body for `POST /api/sessions`
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub wake_word_model: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl CreateSessionRequest {
    pub fn into_new_session(self) -> NewSession {
        NewSession {
            wake_word_model: self.wake_word_model,
            user_id: self.user_id.unwrap_or_else(|| "default".to_string()),
            metadata: self.metadata.unwrap_or_else(empty_object),
        }
    }
}

/// Token counters used by the usage view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUsage {
    pub id: String,
    #[serde(with = "super::timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub total_input_tokens: Option<i64>,
    #[serde(default)]
    pub total_output_tokens: Option<i64>,
}
