//! Rolling buffer of captured change events plus the monitor's controls
//!
//! The buffer is newest-first and bounded; statistics are always computed over
//! the whole buffer while listings can be filtered by change type and table.

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::broadcast;

use super::RealtimeError;
use crate::models::{ChangeType, RealtimeEvent, TableName};

/// Default number of events kept in the buffer
pub const DEFAULT_MAX_EVENTS: usize = 200;
/// Capacity of the fan-out channel to websocket watchers
const WATCH_CHANNEL_CAPACITY: usize = 256;

/// Subscription lifecycle as seen by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Idle,
    Connecting,
    Listening,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Listening => "listening",
        }
    }
}

/// Listing filter. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub event_type: Option<ChangeType>,
    pub table: Option<TableName>,
}

impl EventFilter {
    pub fn matches(&self, event: &RealtimeEvent) -> bool {
        self.event_type.map(|t| t == event.event_type).unwrap_or(true)
            && self.table.map(|t| t == event.table).unwrap_or(true)
    }
}

/// Per-table event counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub sessions: usize,
    pub messages: usize,
    pub tool_calls: usize,
}

/// Counts over the whole buffer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub total: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub by_table: TableCounts,
}

struct MonitorState {
    events: VecDeque<RealtimeEvent>,
    selected_tables: Vec<TableName>,
    status: MonitorStatus,
}

/// Shared monitor state. Cheap to read from handlers, written by the subscriber.
pub struct RealtimeMonitor {
    state: RwLock<MonitorState>,
    max_events: usize,
    watchers: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeMonitor {
    pub fn new(max_events: usize) -> Self {
        let (watchers, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(MonitorState {
                events: VecDeque::new(),
                selected_tables: TableName::all().to_vec(),
                status: MonitorStatus::Idle,
            }),
            max_events: max_events.max(1),
            watchers,
        }
    }

    /// Capture a change: newest first, oldest dropped past capacity
    pub fn record(
        &self,
        table: TableName,
        event_type: ChangeType,
        payload: Value,
    ) -> RealtimeEvent {
        let event = RealtimeEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            table,
            event_type,
            payload,
        };

        {
            let mut state = self.state.write();
            state.events.push_front(event.clone());
            state.events.truncate(self.max_events);
        }

        // No receivers is fine: nobody is watching right now
        let _ = self.watchers.send(event.clone());
        event
    }

    /// Buffered events matching `filter`, newest first
    pub fn events(&self, filter: EventFilter) -> Vec<RealtimeEvent> {
        self.state
            .read()
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> MonitorStats {
        let state = self.state.read();
        let mut stats = MonitorStats {
            total: state.events.len(),
            ..Default::default()
        };

        for event in &state.events {
            match event.event_type {
                ChangeType::Insert => stats.inserts += 1,
                ChangeType::Update => stats.updates += 1,
                ChangeType::Delete => stats.deletes += 1,
            }
            match event.table {
                TableName::ConversationSessions => stats.by_table.sessions += 1,
                TableName::ConversationMessages => stats.by_table.messages += 1,
                TableName::ToolCalls => stats.by_table.tool_calls += 1,
            }
        }

        stats
    }

    /// Empty the buffer. Returns how many events were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state.write();
        let count = state.events.len();
        state.events.clear();
        count
    }

    pub fn selected_tables(&self) -> Vec<TableName> {
        self.state.read().selected_tables.clone()
    }

    /// Replace the table selection. Refused while a subscription is active.
    pub fn set_tables(&self, tables: &[TableName]) -> Result<Vec<TableName>, RealtimeError> {
        let mut state = self.state.write();
        if state.status != MonitorStatus::Idle {
            return Err(RealtimeError::SelectionLocked);
        }

        // Keep display order and drop duplicates
        state.selected_tables = TableName::all()
            .iter()
            .copied()
            .filter(|t| tables.contains(t))
            .collect();
        Ok(state.selected_tables.clone())
    }

    /// Add or remove one table. Refused while a subscription is active.
    pub fn toggle_table(&self, table: TableName) -> Result<Vec<TableName>, RealtimeError> {
        let mut state = self.state.write();
        if state.status != MonitorStatus::Idle {
            return Err(RealtimeError::SelectionLocked);
        }

        if state.selected_tables.contains(&table) {
            state.selected_tables.retain(|t| *t != table);
        } else {
            state.selected_tables.push(table);
            state
                .selected_tables
                .sort_by_key(|t| TableName::all().iter().position(|x| x == t));
        }
        Ok(state.selected_tables.clone())
    }

    pub fn status(&self) -> MonitorStatus {
        self.state.read().status
    }

    pub fn set_status(&self, status: MonitorStatus) {
        let mut state = self.state.write();
        if state.status != status {
            log::debug!("[REALTIME] Status {} -> {}", state.status.as_str(), status.as_str());
            state.status = status;
        }
    }

    pub fn is_listening(&self) -> bool {
        self.status() == MonitorStatus::Listening
    }

    /// Receive every event recorded from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.watchers.subscribe()
    }
}

impl Default for RealtimeMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_buffer_is_newest_first_and_bounded() {
        let monitor = RealtimeMonitor::new(3);
        for i in 0..5 {
            monitor.record(TableName::ToolCalls, ChangeType::Insert, json!({"id": i}));
        }

        let events = monitor.events(EventFilter::default());
        let ids: Vec<i64> = events.iter().map(|e| e.payload["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![4, 3, 2]);
    }

    #[test]
    fn test_filter_by_type_and_table() {
        let monitor = RealtimeMonitor::default();
        monitor.record(TableName::ConversationMessages, ChangeType::Insert, json!({}));
        monitor.record(TableName::ConversationMessages, ChangeType::Update, json!({}));
        monitor.record(TableName::ToolCalls, ChangeType::Insert, json!({}));

        let inserts = monitor.events(EventFilter {
            event_type: Some(ChangeType::Insert),
            table: None,
        });
        assert_eq!(inserts.len(), 2);

        let message_inserts = monitor.events(EventFilter {
            event_type: Some(ChangeType::Insert),
            table: Some(TableName::ConversationMessages),
        });
        assert_eq!(message_inserts.len(), 1);
    }

    #[test]
    fn test_stats_cover_whole_buffer() {
        let monitor = RealtimeMonitor::default();
        monitor.record(TableName::ConversationSessions, ChangeType::Insert, json!({}));
        monitor.record(TableName::ConversationSessions, ChangeType::Update, json!({}));
        monitor.record(TableName::ConversationMessages, ChangeType::Insert, json!({}));
        monitor.record(TableName::ToolCalls, ChangeType::Delete, json!({}));

        let stats = monitor.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.inserts, 2);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(
            stats.by_table,
            TableCounts {
                sessions: 2,
                messages: 1,
                tool_calls: 1
            }
        );
    }

    #[test]
    fn test_clear() {
        let monitor = RealtimeMonitor::default();
        monitor.record(TableName::ToolCalls, ChangeType::Insert, json!({}));
        assert_eq!(monitor.clear(), 1);
        assert_eq!(monitor.stats(), MonitorStats::default());
    }

    #[test]
    fn test_toggle_table_keeps_display_order() {
        let monitor = RealtimeMonitor::default();
        assert_eq!(monitor.selected_tables(), TableName::all().to_vec());

        let after_remove = monitor.toggle_table(TableName::ConversationSessions).unwrap();
        assert_eq!(after_remove, vec![TableName::ConversationMessages, TableName::ToolCalls]);

        let after_add = monitor.toggle_table(TableName::ConversationSessions).unwrap();
        assert_eq!(after_add, TableName::all().to_vec());
    }

    #[test]
    fn test_selection_locked_while_not_idle() {
        let monitor = RealtimeMonitor::default();
        monitor.set_status(MonitorStatus::Listening);

        assert!(matches!(
            monitor.toggle_table(TableName::ToolCalls),
            Err(RealtimeError::SelectionLocked)
        ));
        assert!(matches!(monitor.set_tables(&[]), Err(RealtimeError::SelectionLocked)));

        monitor.set_status(MonitorStatus::Idle);
        assert_eq!(
            monitor
                .set_tables(&[TableName::ToolCalls, TableName::ToolCalls])
                .unwrap(),
            vec![TableName::ToolCalls]
        );
    }

    #[tokio::test]
    async fn test_watchers_receive_recorded_events() {
        let monitor = RealtimeMonitor::default();
        let mut rx = monitor.subscribe();

        let recorded = monitor.record(
            TableName::ConversationMessages,
            ChangeType::Insert,
            json!({"id": 1}),
        );
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, recorded.id);
    }
}
