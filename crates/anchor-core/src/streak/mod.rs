//! Streak calculations.
//!
//! Two separate mechanisms for two practice types:
//! - [`compute_streak`]: derived from the local session log, with one grace
//!   day per run.
//! - [`effective_stabilize_streak`]: the server's stabilize counter,
//!   decayed when the last stabilize event is too old.

mod practice;
mod stabilize;

pub use practice::{compute_streak, StreakSnapshot};
pub use stabilize::effective_stabilize_streak;

use chrono::{DateTime, NaiveDate, TimeZone};

use crate::session::SessionLog;
use crate::storage::KeyValueStore;

/// Key holding the last day the grace exception covered (`YYYY-MM-DD`).
pub const GRACE_MARKER_KEY: &str = "streak.last_grace_day";

/// Compute the streak for display and persist a newly used grace day.
///
/// Marker I/O failures degrade to "no marker"; the streak is still returned.
pub async fn refresh_streak<K, Tz>(log: &SessionLog, kv: &K, now: &DateTime<Tz>) -> StreakSnapshot
where
    K: KeyValueStore,
    Tz: TimeZone,
{
    let marker = match kv.get(GRACE_MARKER_KEY).await {
        Ok(value) => value.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        Err(e) => {
            tracing::debug!("could not read grace marker: {e}");
            None
        }
    };

    let snapshot = compute_streak(log.entries(), marker, now);

    if let Some(day) = snapshot.grace_day_used {
        if marker != Some(day) {
            if let Err(e) = kv.set(GRACE_MARKER_KEY, &day.format("%Y-%m-%d").to_string()).await {
                tracing::warn!("could not persist grace marker: {e}");
            }
        }
    }
    snapshot
}
