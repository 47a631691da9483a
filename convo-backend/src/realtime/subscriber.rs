//! Websocket task that keeps the monitor fed with database changes

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::monitor::{MonitorStatus, RealtimeMonitor};
use super::protocol::{interpret, Inbound, PhxMessage, RefCounter, MONITOR_TOPIC};
use super::RealtimeError;
use crate::db::SupabaseClient;
use crate::models::TableName;

/// Default heartbeat period; the server drops sockets silent for ~60s
pub const DEFAULT_HEARTBEAT_SECS: u64 = 25;
/// Shortest heartbeat period accepted
const MIN_HEARTBEAT: Duration = Duration::from_secs(1);

struct RunningSubscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns at most one live subscription
pub struct RealtimeSubscriber {
    monitor: Arc<RealtimeMonitor>,
    heartbeat_interval: Duration,
    running: Mutex<Option<RunningSubscription>>,
    /// Bumped on every start; only the newest task may reset the status
    generation: Arc<AtomicU64>,
}

impl RealtimeSubscriber {
    pub fn new(monitor: Arc<RealtimeMonitor>, heartbeat_interval: Duration) -> Self {
        Self {
            monitor,
            heartbeat_interval: heartbeat_interval.max(MIN_HEARTBEAT),
            running: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a subscription task is still alive
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }

    /// Start listening on the currently selected tables
    pub fn start(&self, client: &SupabaseClient) -> Result<Vec<TableName>, RealtimeError> {
        let tables = self.monitor.selected_tables();
        if tables.is_empty() {
            return Err(RealtimeError::NoTablesSelected);
        }

        let url = client.realtime_url()?;
        let access_token = client.api_key().to_string();

        let mut running = self.running.lock();
        if running.as_ref().map(|r| !r.handle.is_finished()).unwrap_or(false) {
            return Err(RealtimeError::AlreadyRunning);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.monitor.set_status(MonitorStatus::Connecting);

        let cancel = CancellationToken::new();
        let task = SubscriptionTask {
            url,
            access_token,
            tables: tables.clone(),
            monitor: self.monitor.clone(),
            cancel: cancel.clone(),
            heartbeat_interval: self.heartbeat_interval,
        };
        let exit = IdleOnExit {
            monitor: self.monitor.clone(),
            generation,
            current: self.generation.clone(),
        };
        let handle = tokio::spawn(task.run(exit));

        *running = Some(RunningSubscription { cancel, handle });
        log::info!(
            "[REALTIME] Subscribing to {}",
            tables.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
        );

        Ok(tables)
    }

    /// Leave the channel and wait for the task to wind down.
    /// Returns false when nothing was running.
    pub async fn stop(&self) -> bool {
        let running = self.running.lock().take();

        let stopped = match running {
            Some(RunningSubscription { cancel, handle }) => {
                cancel.cancel();
                if let Err(e) = handle.await {
                    log::warn!("[REALTIME] Subscription task ended abnormally: {}", e);
                }
                true
            }
            None => false,
        };

        // A start() may have slipped in while the old task wound down
        if self.running.lock().is_none() {
            self.monitor.set_status(MonitorStatus::Idle);
        }
        stopped
    }
}

/// Returns the monitor to idle when a subscription task exits, panics
/// included, unless a newer subscription has been started since.
struct IdleOnExit {
    monitor: Arc<RealtimeMonitor>,
    generation: u64,
    current: Arc<AtomicU64>,
}

impl Drop for IdleOnExit {
    fn drop(&mut self) {
        if self.current.load(Ordering::SeqCst) == self.generation {
            self.monitor.set_status(MonitorStatus::Idle);
        }
    }
}

struct SubscriptionTask {
    url: Url,
    access_token: String,
    tables: Vec<TableName>,
    monitor: Arc<RealtimeMonitor>,
    cancel: CancellationToken,
    heartbeat_interval: Duration,
}

impl SubscriptionTask {
    /// `_exit` lives as long as the task, so its drop marks the end
    async fn run(self, _exit: IdleOnExit) {
        match self.listen().await {
            Ok(()) => log::info!("[REALTIME] Subscription closed"),
            Err(e) => log::error!("[REALTIME] Subscription ended: {}", e),
        }
    }

    async fn listen(&self) -> Result<(), RealtimeError> {
        let connect = connect_async(self.url.as_str());
        let (socket, _) = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            result = connect => result?,
        };
        let (mut sink, mut stream) = socket.split();

        let mut refs = RefCounter::default();
        let join_ref = refs.next();
        let join = PhxMessage::join(MONITOR_TOPIC, &self.tables, &self.access_token, &join_ref);
        sink.send(encode(&join)?).await?;

        let mut heartbeat = tokio::time::interval(self.heartbeat_interval);
        // The first tick fires immediately; the join already proves liveness
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let leave = PhxMessage::leave(MONITOR_TOPIC, &refs.next(), &join_ref);
                    let _ = sink.send(encode(&leave)?).await;
                    let _ = sink.close().await;
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    sink.send(encode(&PhxMessage::heartbeat(&refs.next()))?).await?;
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if !self.handle_frame(text.as_str(), &join_ref)? {
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
            }
        }
    }

    /// Apply one inbound frame. Returns false when the channel is gone.
    fn handle_frame(&self, text: &str, join_ref: &str) -> Result<bool, RealtimeError> {
        let msg: PhxMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("[REALTIME] Ignoring malformed frame: {}", e);
                return Ok(true);
            }
        };

        match interpret(&msg, join_ref) {
            Inbound::Subscribed => {
                if !self.monitor.is_listening() {
                    log::info!("[REALTIME] Subscribed");
                }
                self.monitor.set_status(MonitorStatus::Listening);
                Ok(true)
            }
            Inbound::Change(change) => {
                log::debug!("[REALTIME] {} on {}", change.event_type, change.table);
                self.monitor.record(change.table, change.event_type, change.payload);
                Ok(true)
            }
            Inbound::Rejected(reason) => Err(RealtimeError::Rejected(reason)),
            Inbound::Closed(reason) => {
                log::warn!("[REALTIME] {}", reason);
                Ok(false)
            }
            Inbound::Ignored => Ok(true),
        }
    }
}

fn encode(msg: &PhxMessage) -> Result<Message, RealtimeError> {
    Ok(Message::Text(serde_json::to_string(msg)?.into()))
}
