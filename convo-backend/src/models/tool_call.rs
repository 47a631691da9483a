use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::empty_object;

/// A tool invocation recorded against an assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: i64,
    pub message_id: i64,
    pub tool_name: String,
    #[serde(default = "empty_object")]
    pub arguments: Value,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(with = "super::timestamp")]
    pub executed_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
}

/// Insert payload for a new tool call
#[derive(Debug, Clone, Serialize)]
pub struct NewToolCall {
    pub message_id: i64,
    pub tool_name: String,
    pub arguments: Value,
    pub result: Option<String>,
    pub duration_ms: Option<f64>,
}

/// Request body for `POST /api/tool-calls`
#[derive(Debug, Default, Deserialize)]
pub struct CreateToolCallRequest {
    #[serde(default)]
    pub message_id: Option<i64>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
}

impl CreateToolCallRequest {
    /// Returns `None` when `message_id` or `tool_name` is missing or empty
    pub fn into_new_tool_call(self) -> Option<NewToolCall> {
        let message_id = self.message_id.filter(|id| *id != 0)?;
        let tool_name = self.tool_name.filter(|name| !name.is_empty())?;

        Some(NewToolCall {
            message_id,
            tool_name,
            arguments: self.arguments.unwrap_or_else(empty_object),
            result: self.result,
            duration_ms: self.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_requires_message_and_tool() {
        let missing_tool: CreateToolCallRequest =
            serde_json::from_value(json!({"message_id": 4})).unwrap();
        assert!(missing_tool.into_new_tool_call().is_none());

        let zero_id: CreateToolCallRequest =
            serde_json::from_value(json!({"message_id": 0, "tool_name": "lights"})).unwrap();
        assert!(zero_id.into_new_tool_call().is_none());

        let ok: CreateToolCallRequest = serde_json::from_value(json!({
            "message_id": 4,
            "tool_name": "lights",
            "duration_ms": 12.5
        }))
        .unwrap();
        let new = ok.into_new_tool_call().unwrap();
        assert_eq!(new.tool_name, "lights");
        assert_eq!(new.arguments, json!({}));
        assert_eq!(new.duration_ms, Some(12.5));
    }
}
