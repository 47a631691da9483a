//! Conversation message operations

use super::super::supabase::{eq, DbResult, SupabaseClient};
use crate::models::{ConversationMessage, NewMessage, TableName};

const TABLE: TableName = TableName::ConversationMessages;

impl SupabaseClient {
    /// Append a message to a session
    pub async fn create_message(&self, message: &NewMessage) -> DbResult<ConversationMessage> {
        self.insert_one(TABLE.as_str(), message).await
    }

    /// All messages of a session in chronological order
    pub async fn list_messages(&self, session_id: &str) -> DbResult<Vec<ConversationMessage>> {
        self.select(
            TABLE.as_str(),
            &[
                ("select", "*".to_string()),
                ("session_id", eq(session_id)),
                ("order", "timestamp.asc".to_string()),
            ],
        )
        .await
    }
}
