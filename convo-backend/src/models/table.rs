use serde::{Deserialize, Serialize};

/// Tables the dashboard reads from and watches for changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    ConversationSessions,
    ConversationMessages,
    ToolCalls,
}

impl TableName {
    /// The table name as known to the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConversationSessions => "conversation_sessions",
            Self::ConversationMessages => "conversation_messages",
            Self::ToolCalls => "tool_calls",
        }
    }

    /// All monitored tables, in display order
    pub fn all() -> &'static [TableName] {
        &[
            Self::ConversationSessions,
            Self::ConversationMessages,
            Self::ToolCalls,
        ]
    }

    pub fn from_str(s: &str) -> Option<TableName> {
        match s {
            "conversation_sessions" => Some(Self::ConversationSessions),
            "conversation_messages" => Some(Self::ConversationMessages),
            "tool_calls" => Some(Self::ToolCalls),
            _ => None,
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
