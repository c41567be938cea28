//! Merge applicable events into one ordered station and a wake deadline.

use chrono::{DateTime, Duration, Utc};

use super::settings::SchedulerConfig;
use super::store::EventStore;
use crate::common::constants::{FALLBACK_WAKE_SECS, OPEN_END_HORIZON_SECS, PRE_SUNRISE_WAKE_SECS};
use crate::geo::sunrise;
use crate::station::Station;

/// Where the flag belongs now and when that next changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchedule {
    pub ordered: Station,
    /// `None` when nothing is scheduled.
    pub next_change: Option<DateTime<Utc>>,
    pub next_station: Station,
}

impl Default for ResolvedSchedule {
    fn default() -> Self {
        Self {
            ordered: Station::Full,
            next_change: None,
            next_station: Station::Unknown,
        }
    }
}

/// Resolve the store against `now`.
///
/// Stale events are purged first, and applicable events whose window has
/// closed are cleared. If any applicable event covers `now` the flag is at
/// HALF until the end of the merged window formed by chaining overlapping
/// events; otherwise it is FULL until the earliest future begin, if any.
pub fn resolve_schedule(store: &mut EventStore, now: DateTime<Utc>) -> ResolvedSchedule {
    store.purge(now);

    let open_end = now + Duration::seconds(OPEN_END_HORIZON_SECS);
    let mut windows: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    let mut expired = Vec::new();
    let mut in_progress = false;
    let mut merged_end = now;
    let mut next_begin: Option<DateTime<Utc>> = None;

    for (index, slot) in store.slots().iter().enumerate() {
        let Some(event) = slot.as_ref().filter(|event| event.applies) else {
            continue;
        };
        let end = event.end.unwrap_or(open_end);

        match event.begin {
            Some(begin) if begin > now => {
                next_begin = Some(next_begin.map_or(begin, |b| b.min(begin)));
                windows.push((begin, end));
            }
            Some(_) if end > now => {
                in_progress = true;
                merged_end = merged_end.max(end);
            }
            _ => expired.push(index),
        }
    }

    for index in expired {
        store.clear(index);
    }

    if in_progress {
        // Fixed point: absorb future windows that start inside the merged
        // window and reach past it.
        let mut changed = true;
        while changed {
            changed = false;
            for &(begin, end) in &windows {
                if begin <= merged_end && end > merged_end {
                    merged_end = end;
                    changed = true;
                }
            }
        }

        return ResolvedSchedule {
            ordered: Station::Half,
            next_change: Some(merged_end),
            next_station: Station::Full,
        };
    }

    match next_begin {
        Some(begin) => ResolvedSchedule {
            ordered: Station::Full,
            next_change: Some(begin),
            next_station: Station::Half,
        },
        None => ResolvedSchedule::default(),
    }
}

/// When the scheduler should next re-resolve.
///
/// The earlier of the next scheduled change and half an hour before the next
/// sunrise (today's, else tomorrow's). If neither sunrise is usable, an hour
/// from now.
pub fn next_wake(schedule: &ResolvedSchedule, config: &SchedulerConfig, now: DateTime<Utc>) -> DateTime<Utc> {
    let before_sunrise = |offset_days: i64| {
        let date = now.date_naive() + Duration::days(offset_days);
        sunrise(date, config.latitude, config.longitude)
            .map(|rise| rise - Duration::seconds(PRE_SUNRISE_WAKE_SECS))
            .filter(|wake| *wake >= now)
    };

    let check = before_sunrise(0)
        .or_else(|| before_sunrise(1))
        .unwrap_or_else(|| now + Duration::seconds(FALLBACK_WAKE_SECS));

    match schedule.next_change {
        Some(change) => check.min(change),
        None => check,
    }
}
