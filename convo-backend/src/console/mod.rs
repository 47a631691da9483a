//! In-memory console log streams, one ring buffer per token
//!
//! Agents push debug lines with a token of their choosing and the dashboard
//! polls them back with a `since` cursor. Each token keeps at most
//! `max_per_token` entries (oldest evicted first) and entries older than the
//! TTL are dropped on read and by a periodic sweep. Nothing is persisted: the
//! store is per process and empties on restart.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::models::ConsoleLog;

/// Default number of entries kept per token
pub const DEFAULT_MAX_LOGS_PER_TOKEN: usize = 100;
/// Default entry lifetime in seconds
pub const DEFAULT_LOG_TTL_SECS: u64 = 60 * 60;
/// How often the background sweep runs
pub const PRUNE_INTERVAL_SECS: u64 = 60;
/// Longest accepted entry lifetime (ten years)
pub const MAX_LOG_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Token-scoped log buffers
pub struct ConsoleLogStore {
    logs: DashMap<String, VecDeque<ConsoleLog>>,
    max_per_token: usize,
    ttl: chrono::Duration,
}

impl ConsoleLogStore {
    pub fn new(max_per_token: usize, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl.min(Duration::from_secs(MAX_LOG_TTL_SECS)))
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_LOG_TTL_SECS as i64));
        ConsoleLogStore {
            logs: DashMap::new(),
            max_per_token: max_per_token.max(1),
            ttl,
        }
    }

    /// Append a line to the token's stream, evicting the oldest entry when full
    pub fn append(
        &self,
        token: &str,
        text: String,
        is_positive: bool,
        timestamp: Option<DateTime<Utc>>,
    ) -> ConsoleLog {
        let now = Utc::now();
        let entry = ConsoleLog {
            id: generate_log_id(now),
            timestamp: timestamp.unwrap_or(now),
            text,
            is_positive,
        };

        let mut logs = self.logs.entry(token.to_string()).or_default();
        logs.push_back(entry.clone());
        while logs.len() > self.max_per_token {
            logs.pop_front();
        }

        entry
    }

    /// Entries for `token` newer than `since` (all when `None`), oldest first.
    /// Expired entries for the token are evicted before filtering.
    pub fn fetch(&self, token: &str, since: Option<DateTime<Utc>>) -> Vec<ConsoleLog> {
        self.fetch_at(token, since, Utc::now())
    }

    fn fetch_at(
        &self,
        token: &str,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<ConsoleLog> {
        let cutoff = self.cutoff(now);

        let result = match self.logs.get_mut(token) {
            Some(mut logs) => {
                if let Some(cutoff) = cutoff {
                    logs.retain(|log| log.timestamp > cutoff);
                }
                logs.iter()
                    .filter(|log| since.map(|s| log.timestamp > s).unwrap_or(true))
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        self.logs.remove_if(token, |_, logs| logs.is_empty());
        result
    }

    /// Oldest timestamp still alive at `now`. `None` when the TTL reaches
    /// past the earliest representable time, so nothing expires.
    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.ttl)
    }

    /// Drop every entry for `token`. Returns whether the token had a stream.
    pub fn clear(&self, token: &str) -> bool {
        self.logs.remove(token).is_some()
    }

    /// Evict expired entries across all tokens, dropping emptied streams.
    /// Returns the number of entries removed.
    pub fn prune_expired(&self) -> usize {
        self.prune_expired_at(Utc::now())
    }

    fn prune_expired_at(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = self.cutoff(now) else {
            return 0;
        };
        let mut removed = 0;

        self.logs.retain(|_, logs| {
            let before = logs.len();
            logs.retain(|log| log.timestamp > cutoff);
            removed += before - logs.len();
            !logs.is_empty()
        });

        removed
    }

    /// Number of tokens with at least one buffered entry
    pub fn token_count(&self) -> usize {
        self.logs.len()
    }

    /// Number of entries buffered for `token`
    #[cfg(test)]
    pub fn len(&self, token: &str) -> usize {
        self.logs.get(token).map(|logs| logs.len()).unwrap_or(0)
    }
}

impl Default for ConsoleLogStore {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_LOGS_PER_TOKEN,
            Duration::from_secs(DEFAULT_LOG_TTL_SECS),
        )
    }
}

/// Sweep expired entries every `every` until `shutdown` fires
pub async fn run_pruner(
    store: Arc<ConsoleLogStore>,
    every: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("[CONSOLE] Pruner received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                let removed = store.prune_expired();
                if removed > 0 {
                    log::debug!(
                        "[CONSOLE] Pruned {} expired entries, {} tokens active",
                        removed,
                        store.token_count()
                    );
                }
            }
        }
    }
}

/// `"<unix millis>-<9 base36 chars>"`
fn generate_log_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ID_ALPHABET.len());
            ID_ALPHABET[idx] as char
        })
        .collect();
    format!("{}-{}", now.timestamp_millis(), suffix)
}

/// Render an arbitrary JSON value as log text. `None` for JSON null.
pub fn stringify_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Truthiness as a dynamically typed agent would mean it
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
