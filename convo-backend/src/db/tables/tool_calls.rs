//! Tool call operations

use super::super::supabase::{in_list, DbResult, SupabaseClient};
use crate::models::{NewToolCall, TableName, ToolCall};

const TABLE: TableName = TableName::ToolCalls;

impl SupabaseClient {
    /// Record a tool invocation
    pub async fn create_tool_call(&self, tool_call: &NewToolCall) -> DbResult<ToolCall> {
        self.insert_one(TABLE.as_str(), tool_call).await
    }

    /// Tool calls belonging to any of `message_ids`, oldest first
    pub async fn list_tool_calls_for_messages(
        &self,
        message_ids: &[i64],
    ) -> DbResult<Vec<ToolCall>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.select(
            TABLE.as_str(),
            &[
                ("select", "*".to_string()),
                ("message_id", in_list(message_ids)),
                ("order", "executed_at.asc".to_string()),
            ],
        )
        .await
    }
}
