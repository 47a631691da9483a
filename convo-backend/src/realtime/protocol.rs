//! Phoenix channel frames spoken by the Supabase realtime endpoint

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{ChangeType, TableName};

/// Channel the monitor joins
pub const MONITOR_TOPIC: &str = "realtime:realtime-monitor";
/// Topic heartbeats are sent on
pub const PHOENIX_TOPIC: &str = "phoenix";
/// Schema the monitored tables live in
pub const PUBLIC_SCHEMA: &str = "public";

/// Phoenix events the subscriber cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhxEvent {
    Join,
    Leave,
    Reply,
    Error,
    Close,
    Heartbeat,
    System,
    PostgresChanges,
}

impl PhxEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "phx_join",
            Self::Leave => "phx_leave",
            Self::Reply => "phx_reply",
            Self::Error => "phx_error",
            Self::Close => "phx_close",
            Self::Heartbeat => "heartbeat",
            Self::System => "system",
            Self::PostgresChanges => "postgres_changes",
        }
    }

    pub fn from_str(s: &str) -> Option<PhxEvent> {
        match s {
            "phx_join" => Some(Self::Join),
            "phx_leave" => Some(Self::Leave),
            "phx_reply" => Some(Self::Reply),
            "phx_error" => Some(Self::Error),
            "phx_close" => Some(Self::Close),
            "heartbeat" => Some(Self::Heartbeat),
            "system" => Some(Self::System),
            "postgres_changes" => Some(Self::PostgresChanges),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhxEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<PhxEvent> for String {
    fn from(event: PhxEvent) -> Self {
        event.as_str().to_string()
    }
}

/// A single websocket frame in either direction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhxMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub ref_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhxMessage {
    pub fn new(
        topic: impl Into<String>,
        event: impl Into<String>,
        payload: Value,
        ref_: Option<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            ref_,
            join_ref: None,
        }
    }

    /// Join `topic` with one `postgres_changes` binding per table
    pub fn join(topic: &str, tables: &[TableName], access_token: &str, join_ref: &str) -> Self {
        let bindings: Vec<Value> = tables
            .iter()
            .map(|table| {
                json!({
                    "event": "*",
                    "schema": PUBLIC_SCHEMA,
                    "table": table.as_str()
                })
            })
            .collect();

        let mut msg = Self::new(
            topic,
            PhxEvent::Join,
            json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": bindings,
                    "private": false
                },
                "access_token": access_token
            }),
            Some(join_ref.to_string()),
        );
        msg.join_ref = Some(join_ref.to_string());
        msg
    }

    pub fn heartbeat(ref_: &str) -> Self {
        Self::new(PHOENIX_TOPIC, PhxEvent::Heartbeat, json!({}), Some(ref_.to_string()))
    }

    pub fn leave(topic: &str, ref_: &str, join_ref: &str) -> Self {
        let mut msg = Self::new(topic, PhxEvent::Leave, json!({}), Some(ref_.to_string()));
        msg.join_ref = Some(join_ref.to_string());
        msg
    }

    pub fn kind(&self) -> Option<PhxEvent> {
        PhxEvent::from_str(&self.event)
    }
}

/// A row change extracted from a `postgres_changes` frame
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub table: TableName,
    pub event_type: ChangeType,
    pub payload: Value,
}

/// What an inbound frame means for the subscription
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The server confirmed the subscription
    Subscribed,
    /// A row changed
    Change(ChangeRecord),
    /// The server refused the join or reported a subscription error
    Rejected(String),
    /// The channel was closed or crashed server-side
    Closed(String),
    /// Heartbeat replies, presence and anything else we do not track
    Ignored,
}

/// Interpret a frame received on the monitor channel
pub fn interpret(msg: &PhxMessage, join_ref: &str) -> Inbound {
    if msg.topic == PHOENIX_TOPIC {
        return Inbound::Ignored;
    }

    match msg.kind() {
        Some(PhxEvent::Reply) if msg.ref_.as_deref() == Some(join_ref) => {
            if status_of(&msg.payload) == Some("ok") {
                Inbound::Subscribed
            } else {
                Inbound::Rejected(reason_of(&msg.payload))
            }
        }
        Some(PhxEvent::System) => match status_of(&msg.payload) {
            Some("ok") => Inbound::Subscribed,
            Some("error") => Inbound::Rejected(reason_of(&msg.payload)),
            _ => Inbound::Ignored,
        },
        Some(PhxEvent::PostgresChanges) => match parse_change(&msg.payload) {
            Some(change) => Inbound::Change(change),
            None => Inbound::Ignored,
        },
        Some(PhxEvent::Error) => Inbound::Closed("channel crashed on the server".to_string()),
        Some(PhxEvent::Close) => Inbound::Closed("channel closed by the server".to_string()),
        _ => Inbound::Ignored,
    }
}

fn status_of(payload: &Value) -> Option<&str> {
    payload.get("status").and_then(Value::as_str)
}

fn reason_of(payload: &Value) -> String {
    payload
        .pointer("/response/reason")
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

/// Pull table, change type and row out of a `postgres_changes` payload.
///
/// The row is the new record when it has any columns, otherwise the old
/// record (DELETEs), otherwise an empty object.
pub fn parse_change(payload: &Value) -> Option<ChangeRecord> {
    let data = payload.get("data")?;
    let table = TableName::from_str(data.get("table")?.as_str()?)?;
    let event_type = ChangeType::from_str(data.get("type")?.as_str()?)?;

    let non_empty = |key: &str| {
        data.get(key)
            .filter(|v| v.as_object().map(|o| !o.is_empty()).unwrap_or(false))
            .cloned()
    };
    let payload = non_empty("record")
        .or_else(|| non_empty("old_record"))
        .unwrap_or_else(crate::models::empty_object);

    Some(ChangeRecord {
        table,
        event_type,
        payload,
    })
}

/// Monotonic message refs for one connection
#[derive(Debug, Default)]
pub struct RefCounter {
    next: u64,
}

impl RefCounter {
    pub fn next(&mut self) -> String {
        self.next += 1;
        self.next.to_string()
    }
}
