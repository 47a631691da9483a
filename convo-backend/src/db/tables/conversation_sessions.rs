//! Conversation session operations

use chrono::Utc;
use serde_json::json;

use super::super::supabase::{eq, DbError, DbResult, SupabaseClient};
use crate::models::{ConversationSession, NewSession, SessionUsage, TableName};

const TABLE: TableName = TableName::ConversationSessions;

impl SupabaseClient {
    /// Create a new session row
    pub async fn create_session(&self, session: &NewSession) -> DbResult<ConversationSession> {
        self.insert_one(TABLE.as_str(), session).await
    }

    /// Most recent sessions first
    pub async fn list_sessions(&self, limit: usize) -> DbResult<Vec<ConversationSession>> {
        self.select(
            TABLE.as_str(),
            &[
                ("select", "*".to_string()),
                ("order", "started_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Get a session by ID
    pub async fn get_session(&self, id: &str) -> DbResult<Option<ConversationSession>> {
        let mut rows: Vec<ConversationSession> = self
            .select(
                TABLE.as_str(),
                &[("select", "*".to_string()), ("id", eq(id)), ("limit", "1".to_string())],
            )
            .await?;
        Ok(rows.pop())
    }

    /// Stamp `ended_at` with the current time. `Ok(None)` when no session has this id.
    pub async fn end_session(&self, id: &str) -> DbResult<Option<ConversationSession>> {
        let result = self
            .update_one(
                TABLE.as_str(),
                &[("id", eq(id))],
                &json!({ "ended_at": Utc::now().to_rfc3339() }),
            )
            .await;

        match result {
            Ok(session) => Ok(Some(session)),
            Err(DbError::NotSingleRow) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Token counters for the usage view, newest first
    pub async fn list_session_usage(&self, limit: usize) -> DbResult<Vec<SessionUsage>> {
        self.select(
            TABLE.as_str(),
            &[
                (
                    "select",
                    "id,started_at,total_input_tokens,total_output_tokens".to_string(),
                ),
                ("order", "started_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Cheapest possible round trip, used to test credentials
    pub async fn ping(&self) -> DbResult<()> {
        let _: Vec<serde_json::Value> = self
            .select(
                TABLE.as_str(),
                &[("select", "id".to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(())
    }
}
