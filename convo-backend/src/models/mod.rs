//! Records exchanged with the database, the agent and the dashboard

mod console_log;
mod message;
mod realtime_event;
mod session;
mod table;
pub mod timestamp;
mod tool_call;

pub use console_log::{ConsoleLog, ConsoleLogQuery, ConsoleLogRequest};
pub use message::{
    attach_tool_calls, ConversationMessage, CreateMessageRequest, MessageRequestError,
    MessageRole, MessageWithToolCalls, NewMessage,
};
pub use realtime_event::{ChangeType, RealtimeEvent};
pub use session::{ConversationSession, CreateSessionRequest, NewSession, SessionUsage};
pub use table::TableName;
pub use tool_call::{CreateToolCallRequest, NewToolCall, ToolCall};

use serde_json::{Map, Value};

/// Default for JSON object columns (`metadata`, `arguments`)
pub fn empty_object() -> Value {
    Value::Object(Map::new())
}
