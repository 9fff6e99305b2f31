//! Server-maintained stabilize streak, decayed on read.
//!
//! Kept apart from the log-derived practice streak: this one reflects what
//! the server recorded, not what the local log says.

use chrono::{DateTime, TimeZone, Utc};

/// The stored streak, or zero once more than one full local calendar day
/// separates the last stabilize event from `now`.
pub fn effective_stabilize_streak<Tz: TimeZone>(
    stored_streak: u32,
    last_event_at: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> u32 {
    let Some(last) = last_event_at else {
        return 0;
    };
    let last_day = last.with_timezone(&now.timezone()).date_naive();
    let days_since = (now.date_naive() - last_day).num_days();
    if days_since > 1 {
        0
    } else {
        stored_streak
    }
}
