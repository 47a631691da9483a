pub mod monitor;
pub mod protocol;
pub mod subscriber;
pub mod ws;

pub use monitor::{EventFilter, MonitorStats, MonitorStatus, RealtimeMonitor};

use crate::db::{DbError, SupabaseClient};
use crate::models::{RealtimeEvent, TableName};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use subscriber::RealtimeSubscriber;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Select at least one table to monitor")]
    NoTablesSelected,

    #[error("Realtime monitor is already listening")]
    AlreadyRunning,

    #[error("Cannot change monitored tables while listening")]
    SelectionLocked,

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Subscription rejected: {0}")]
    Rejected(String),
}

/// Owns the monitor state and the websocket subscription feeding it
pub struct RealtimeGateway {
    monitor: Arc<RealtimeMonitor>,
    subscriber: RealtimeSubscriber,
}

impl RealtimeGateway {
    pub fn new(max_events: usize, heartbeat_interval: Duration) -> Self {
        let monitor = Arc::new(RealtimeMonitor::new(max_events));
        let subscriber = RealtimeSubscriber::new(monitor.clone(), heartbeat_interval);
        Self { monitor, subscriber }
    }

    /// Get the monitor for reading events and stats
    pub fn monitor(&self) -> Arc<RealtimeMonitor> {
        self.monitor.clone()
    }

    /// Start listening with the given database credentials
    pub fn start(&self, client: &SupabaseClient) -> Result<Vec<TableName>, RealtimeError> {
        self.subscriber.start(client)
    }

    /// Stop listening. Returns false when nothing was running.
    pub async fn stop(&self) -> bool {
        self.subscriber.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.subscriber.is_running()
    }
}

/// Parse a table name coming from a request
pub fn parse_table(name: &str) -> Result<TableName, RealtimeError> {
    TableName::from_str(name).ok_or_else(|| RealtimeError::UnknownTable(name.to_string()))
}

/// An event as shown to the dashboard, with its one-line summary
#[derive(Debug, Clone, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: RealtimeEvent,
    pub preview: Option<String>,
}

impl From<RealtimeEvent> for EventView {
    fn from(event: RealtimeEvent) -> Self {
        let preview = event.preview();
        Self { event, preview }
    }
}
