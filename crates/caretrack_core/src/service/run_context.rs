//! Per-invocation time context.
//!
//! `today` is captured once when a run starts and threaded into every
//! tiering and dedup decision, so a run that crosses midnight stays
//! internally consistent.

use crate::config::DayBoundary;
use chrono::{NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    /// Calendar day used for tiering and as the notification day bucket.
    pub today: NaiveDate,
    /// Epoch milliseconds stamped on every notification of this run.
    pub started_at_ms: i64,
}

impl RunContext {
    /// Reads the clock once for a new run.
    pub fn capture(boundary: DayBoundary) -> Self {
        Self {
            today: boundary.today(),
            started_at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Builds a context for an explicit day, e.g. a backfill or a test.
    pub fn at(today: NaiveDate, started_at_ms: i64) -> Self {
        Self {
            today,
            started_at_ms,
        }
    }
}
