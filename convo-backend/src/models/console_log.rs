use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One debug line pushed by an agent into its console stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleLog {
    pub id: String,
    #[serde(with = "super::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub is_positive: bool,
}

/// Request body for `POST /api/console/log`.
///
/// Fields stay loosely typed so agents written in dynamic languages can send
/// numbers or booleans as text without being rejected.
#[derive(Debug, Default, Deserialize)]
pub struct ConsoleLogRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub is_positive: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Query parameters for fetching and clearing logs
#[derive(Debug, Default, Deserialize)]
pub struct ConsoleLogQuery {
    pub token: Option<String>,
    pub since: Option<String>,
}
