//! Log-derived practice streak with a single grace day per run.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::session::SessionLogEntry;

/// Derived streak numbers. Recompute on read; never cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakSnapshot {
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Missed day bridged by grace in the current run, if any.
    pub grace_day_used: Option<NaiveDate>,
}

/// Compute the consistency streak as of `now`.
///
/// Days are local calendar dates: each entry counts toward the date it was
/// recorded on, and `now` is read in its own timezone. Walking the calendar
/// forward, an active day extends the run. A missed day is bridged by the
/// grace exception when the next day is active (or is today and still
/// pending), the run has not used grace yet, and `last_grace_day_used` does
/// not fall inside the run before that day. The bridged day counts toward
/// the run. Anything else breaks it. Today with no entry is pending and
/// neither extends nor breaks.
pub fn compute_streak<Tz: TimeZone>(
    entries: &[SessionLogEntry],
    last_grace_day_used: Option<NaiveDate>,
    now: &DateTime<Tz>,
) -> StreakSnapshot {
    let today = now.date_naive();
    let days: BTreeSet<NaiveDate> = entries
        .iter()
        .map(SessionLogEntry::local_date)
        .filter(|d| *d <= today)
        .collect();
    let Some(&first) = days.first() else {
        return StreakSnapshot::default();
    };

    let mut run = 0u32;
    let mut run_start: Option<NaiveDate> = None;
    let mut grace: Option<NaiveDate> = None;
    let mut longest = 0u32;

    let mut day = first;
    while day <= today {
        if days.contains(&day) {
            if run == 0 {
                run_start = Some(day);
                grace = None;
            }
            run += 1;
        } else if day == today {
            // Pending: the user may still practice today.
        } else if run > 0
            && grace.is_none()
            && bridges_to_activity(&days, day, today)
            && marker_allows(last_grace_day_used, run_start, day)
        {
            grace = Some(day);
            run += 1;
        } else {
            run = 0;
            run_start = None;
            grace = None;
        }
        longest = longest.max(run);

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    StreakSnapshot {
        current_streak: run,
        longest_streak: longest,
        grace_day_used: if run > 0 { grace } else { None },
    }
}

/// A gap is a single day only if the day after it is active or is today.
fn bridges_to_activity(days: &BTreeSet<NaiveDate>, gap: NaiveDate, today: NaiveDate) -> bool {
    gap.succ_opt()
        .is_some_and(|next| next == today || days.contains(&next))
}

/// A persisted grace marker earlier in the same run means grace is spent.
fn marker_allows(marker: Option<NaiveDate>, run_start: Option<NaiveDate>, gap: NaiveDate) -> bool {
    match (marker, run_start) {
        (Some(marker), Some(start)) => !(marker >= start && marker < gap),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionType;
    use chrono::{Duration, FixedOffset, Utc};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(n)
    }

    fn at(n: i64, hour: u32) -> DateTime<FixedOffset> {
        day(n)
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_local_timezone(tz())
            .unwrap()
    }

    fn log(days: &[i64]) -> Vec<SessionLogEntry> {
        days.iter()
            .map(|&d| SessionLogEntry::new("anchor", SessionType::Activate, at(d, 9)))
            .collect()
    }

    #[test]
    fn empty_log_is_zero() {
        assert_eq!(compute_streak(&[], None, &at(0, 12)), StreakSnapshot::default());
    }

    #[test]
    fn consecutive_days() {
        let s = compute_streak(&log(&[0, 1, 2]), None, &at(2, 20));
        assert_eq!(s.current_streak, 3);
        assert_eq!(s.longest_streak, 3);
        assert_eq!(s.grace_day_used, None);
    }

    #[test]
    fn today_pending_does_not_break() {
        let s = compute_streak(&log(&[0, 1, 2]), None, &at(3, 8));
        assert_eq!(s.current_streak, 3);
    }

    #[test]
    fn grace_bridges_single_gap() {
        let s = compute_streak(&log(&[0, 1, 3, 4]), None, &at(4, 21));
        assert_eq!(s.current_streak, 5);
        assert_eq!(s.grace_day_used, Some(day(2)));
    }

    #[test]
    fn second_gap_in_run_breaks() {
        let entries = log(&[0, 1, 3, 4]);
        // Day 5 missed and concluded by day 6.
        let s = compute_streak(&entries, Some(day(2)), &at(6, 21));
        assert_eq!(s.current_streak, 0);
        assert_eq!(s.longest_streak, 5);

        let mut with_six = entries.clone();
        with_six.extend(log(&[6]));
        let s = compute_streak(&with_six, Some(day(2)), &at(6, 21));
        assert_eq!(s.current_streak, 1, "no double grace");
    }

    #[test]
    fn two_missed_days_break() {
        let s = compute_streak(&log(&[0, 1, 4]), None, &at(4, 12));
        assert_eq!(s.current_streak, 1);
        assert_eq!(s.longest_streak, 2);
    }

    #[test]
    fn multiple_entries_per_day_count_once() {
        let mut entries = log(&[0, 0, 0, 1]);
        entries.push(SessionLogEntry::new("other", SessionType::Stabilize, at(1, 22)));
        let s = compute_streak(&entries, None, &at(1, 23));
        assert_eq!(s.current_streak, 2);
    }

    #[test]
    fn future_entries_are_ignored() {
        let s = compute_streak(&log(&[5, 6]), None, &at(2, 12));
        assert_eq!(s, StreakSnapshot::default());
        let s = compute_streak(&log(&[1, 2, 3]), None, &at(2, 12));
        assert_eq!(s.current_streak, 2);
    }

    #[test]
    fn marker_inside_run_blocks_grace() {
        // Marker says grace was spent on day 1 of this run; the gap on day 3 cannot use it.
        let s = compute_streak(&log(&[0, 2, 4]), Some(day(1)), &at(4, 12));
        assert_eq!(s.current_streak, 1);
    }

    #[test]
    fn marker_from_older_run_is_irrelevant() {
        let s = compute_streak(&log(&[10, 11, 13]), Some(day(2)), &at(13, 12));
        assert_eq!(s.current_streak, 4);
        assert_eq!(s.grace_day_used, Some(day(12)));
    }

    #[test]
    fn local_day_boundaries() {
        // 23:30 local on day 0 and 00:30 local on day 1 are different days,
        // even though both fall on the same UTC date.
        let late = day(0).and_hms_opt(23, 30, 0).unwrap().and_local_timezone(tz()).unwrap();
        let early = day(1).and_hms_opt(0, 30, 0).unwrap().and_local_timezone(tz()).unwrap();
        let entries = vec![
            SessionLogEntry::new("a", SessionType::Activate, late),
            SessionLogEntry::new("a", SessionType::Activate, early),
        ];
        assert_eq!(
            late.with_timezone(&Utc).date_naive(),
            early.with_timezone(&Utc).date_naive()
        );
        let s = compute_streak(&entries, None, &at(1, 12));
        assert_eq!(s.current_streak, 2);
    }

    #[test]
    fn pure() {
        let entries = log(&[0, 2, 3, 5, 6, 7]);
        let a = compute_streak(&entries, None, &at(7, 12));
        let b = compute_streak(&entries, None, &at(7, 12));
        assert_eq!(a, b);
    }
}
