//! Time expressions for the `from` / `until` ingest parameters
//!
//! Accepted forms:
//! - `now`, `now-1h`, `now+30s`, `-15m`
//! - `<n> <unit> ago`, with `a` / `an` standing for one (`an hour ago`)
//! - unix seconds (`1700000000`) or unix milliseconds (13+ digits)
//! - RFC 3339 (`2023-11-14T22:13:20Z`)
//!
//! Anything else resolves to the current time and logs a warning.

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Resolves time expressions to points in time
pub trait TimeResolver: Send + Sync {
    /// Current time, used for defaults and relative expressions
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Resolve a non-empty expression. Callers skip the call for empty input.
    fn resolve(&self, expr: &str) -> DateTime<Utc>;
}

/// Default resolver, optionally pinned to a fixed clock
#[derive(Debug, Clone, Copy, Default)]
pub struct AtTime {
    fixed_now: Option<DateTime<Utc>>,
}

impl AtTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver whose "now" never moves
    pub fn fixed(now: DateTime<Utc>) -> Self {
        Self {
            fixed_now: Some(now),
        }
    }

    fn parse(&self, expr: &str) -> Option<DateTime<Utc>> {
        let raw = expr.trim();
        let expr = raw.to_ascii_lowercase();
        let now = self.now();

        if expr.is_empty() || expr == "now" {
            return Some(now);
        }

        if let Some(offset) = expr.strip_prefix("now") {
            let offset = offset.trim_start();
            return if let Some(d) = offset.strip_prefix('-') {
                shift(now, parse_span(d)?, false)
            } else if let Some(d) = offset.strip_prefix('+') {
                shift(now, parse_span(d)?, true)
            } else {
                None
            };
        }

        if let Some(d) = expr.strip_prefix('-') {
            return shift(now, parse_span(d)?, false);
        }

        if let Some(span) = expr.strip_suffix("ago") {
            let span = span.trim();
            let span = match span.split_once(' ') {
                Some(("a" | "an", unit)) => format!("1 {}", unit.trim()),
                _ => span.to_string(),
            };
            return shift(now, parse_span(&span)?, false);
        }

        if expr.bytes().all(|b| b.is_ascii_digit()) {
            let value: i64 = expr.parse().ok()?;
            return if expr.len() >= 13 {
                Utc.timestamp_millis_opt(value).single()
            } else {
                Utc.timestamp_opt(value, 0).single()
            };
        }

        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

impl TimeResolver for AtTime {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    fn resolve(&self, expr: &str) -> DateTime<Utc> {
        self.parse(expr).unwrap_or_else(|| {
            tracing::warn!("unrecognized time expression '{}', using current time", expr);
            self.now()
        })
    }
}

fn parse_span(s: &str) -> Option<Duration> {
    humantime::parse_duration(s.trim()).ok()
}

fn shift(now: DateTime<Utc>, by: Duration, forward: bool) -> Option<DateTime<Utc>> {
    let by = chrono::Duration::from_std(by).ok()?;
    if forward {
        now.checked_add_signed(by)
    } else {
        now.checked_sub_signed(by)
    }
}
