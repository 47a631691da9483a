//! Token usage aggregation for the usage view
//!
//! Sessions are summed into overall totals, per-day buckets keyed by UTC date
//! and a fixed number of equal-width intervals spanning the oldest to the
//! newest session.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::SessionUsage;

/// Number of equal-width buckets in the interval series
pub const INTERVAL_COUNT: usize = 12;
/// How many of the most recent days the daily series keeps
pub const DAILY_WINDOW: usize = 14;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
/// Rough per-1K token prices used for the cost estimate (USD)
const INPUT_PRICE_PER_1K: f64 = 0.03;
const OUTPUT_PRICE_PER_1K: f64 = 0.06;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub sessions: usize,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUsage {
    /// `YYYY-MM-DD` in UTC
    pub date: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntervalUsage {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageReport {
    pub totals: UsageTotals,
    pub daily: Vec<DailyUsage>,
    pub intervals: Vec<IntervalUsage>,
}

pub fn summarize(sessions: &[SessionUsage]) -> UsageReport {
    let mut totals = UsageTotals {
        sessions: sessions.len(),
        ..Default::default()
    };
    let mut by_day: BTreeMap<String, DailyUsage> = BTreeMap::new();

    for session in sessions {
        let (input, output) = tokens(session);
        totals.input_tokens += input;
        totals.output_tokens += output;

        let date = session.started_at.format("%Y-%m-%d").to_string();
        let day = by_day.entry(date.clone()).or_insert_with(|| DailyUsage {
            date,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            sessions: 0,
        });
        day.input_tokens += input;
        day.output_tokens += output;
        day.total_tokens += input + output;
        day.sessions += 1;
    }

    totals.total_tokens = totals.input_tokens + totals.output_tokens;
    totals.estimated_cost_usd = estimate_cost(totals.input_tokens, totals.output_tokens);

    let skip = by_day.len().saturating_sub(DAILY_WINDOW);
    let daily = by_day.into_values().skip(skip).collect();

    UsageReport {
        totals,
        daily,
        intervals: intervals(sessions),
    }
}

fn tokens(session: &SessionUsage) -> (i64, i64) {
    (
        session.total_input_tokens.unwrap_or(0),
        session.total_output_tokens.unwrap_or(0),
    )
}

fn estimate_cost(input: i64, output: i64) -> f64 {
    let cost = (input as f64 / 1000.0) * INPUT_PRICE_PER_1K
        + (output as f64 / 1000.0) * OUTPUT_PRICE_PER_1K;
    (cost * 100.0).round() / 100.0
}

/// Split `[oldest, newest]` into equal buckets. The newest session lands in
/// the last bucket.
fn intervals(sessions: &[SessionUsage]) -> Vec<IntervalUsage> {
    let (Some(first), Some(last)) = (
        sessions.iter().map(|s| s.started_at).min(),
        sessions.iter().map(|s| s.started_at).max(),
    ) else {
        return Vec::new();
    };

    let range_ms = (last - first).num_milliseconds().max(1);
    let size_ms = range_ms as f64 / INTERVAL_COUNT as f64;
    let offset = |i: usize| Duration::milliseconds((i as f64 * size_ms).round() as i64);

    let mut buckets: Vec<IntervalUsage> = (0..INTERVAL_COUNT)
        .map(|i| {
            let start = first + offset(i);
            IntervalUsage {
                start,
                end: first + offset(i + 1),
                input_tokens: 0,
                output_tokens: 0,
                total_tokens: 0,
                label: interval_label(start, range_ms),
            }
        })
        .collect();

    for session in sessions {
        let elapsed = (session.started_at - first).num_milliseconds() as f64;
        let index = ((elapsed / size_ms).floor() as usize).min(INTERVAL_COUNT - 1);
        let (input, output) = tokens(session);

        let bucket = &mut buckets[index];
        bucket.input_tokens += input;
        bucket.output_tokens += output;
        bucket.total_tokens += input + output;
    }

    buckets
}

fn interval_label(start: DateTime<Utc>, range_ms: i64) -> String {
    let pattern = if range_ms < DAY_MS {
        "%-I:%M %p"
    } else if range_ms < 7 * DAY_MS {
        "%a %-I %p"
    } else {
        "%b %-d"
    };
    start.format(pattern).to_string()
}
