use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::console::{DEFAULT_LOG_TTL_SECS, DEFAULT_MAX_LOGS_PER_TOKEN};
use crate::realtime::monitor::DEFAULT_MAX_EVENTS;
use crate::realtime::subscriber::DEFAULT_HEARTBEAT_SECS;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub console_max_logs_per_token: usize,
    pub console_log_ttl: Duration,
    pub realtime_max_events: usize,
    pub realtime_heartbeat: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid number"),
            supabase_url: first_set(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]),
            supabase_anon_key: first_set(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]),
            console_max_logs_per_token: parse_or(
                "CONSOLE_MAX_LOGS_PER_TOKEN",
                DEFAULT_MAX_LOGS_PER_TOKEN,
            ),
            console_log_ttl: Duration::from_secs(parse_or(
                "CONSOLE_LOG_TTL_SECS",
                DEFAULT_LOG_TTL_SECS,
            )),
            realtime_max_events: parse_or("REALTIME_MAX_EVENTS", DEFAULT_MAX_EVENTS),
            realtime_heartbeat: Duration::from_secs(nonzero(
                "REALTIME_HEARTBEAT_SECS",
                parse_or("REALTIME_HEARTBEAT_SECS", DEFAULT_HEARTBEAT_SECS),
                DEFAULT_HEARTBEAT_SECS,
            )),
        }
    }

    /// Server-side database credentials, when both halves are set
    pub fn supabase_credentials(&self) -> Option<(&str, &str)> {
        match (self.supabase_url.as_deref(), self.supabase_anon_key.as_deref()) {
            (Some(url), Some(key)) => Some((url, key)),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            supabase_url: None,
            supabase_anon_key: None,
            console_max_logs_per_token: DEFAULT_MAX_LOGS_PER_TOKEN,
            console_log_ttl: Duration::from_secs(DEFAULT_LOG_TTL_SECS),
            realtime_max_events: DEFAULT_MAX_EVENTS,
            realtime_heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
        }
    }
}

/// First non-empty value among `names`
fn first_set(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    parse_value(name, env::var(name).ok(), default)
}

fn parse_value<T: FromStr + Copy + std::fmt::Display>(
    name: &str,
    raw: Option<String>,
    default: T,
) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("{} is not a valid number ({:?}), using {}", name, raw, default);
            default
        }),
        None => default,
    }
}

/// Periods of zero fall back to the default
fn nonzero(name: &str, value: u64, default: u64) -> u64 {
    if value == 0 {
        log::warn!("{} must be greater than zero, using {}", name, default);
        return default;
    }
    value
}
