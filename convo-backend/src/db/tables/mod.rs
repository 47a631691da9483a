//! Table modules - extend SupabaseClient with per-table operations
//!
//! Each module adds `impl SupabaseClient` blocks with methods for one table.

mod conversation_messages; // conversation_messages
mod conversation_sessions; // conversation_sessions (+ usage, ping)
mod tool_calls;            // tool_calls
