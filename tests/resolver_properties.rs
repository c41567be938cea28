//! Property tests for schedule resolution and event matching.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use smartflag::common::logger::Log;
use smartflag::schedule::matching::jurisdiction_matches;
use smartflag::schedule::{MarkDestination, Scheduler, SchedulerConfig, parse_time_mark};
use smartflag::station::Station;
use smartflag::storage::MemoryBlobStore;
use smartflag::testing::{EventJson, new_york_config, utc};

fn now() -> DateTime<Utc> {
    utc(2025, 7, 4, 12, 0)
}

fn mark(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%MZ").to_string()
}

fn configured() -> Scheduler {
    Log::set_enabled(false);
    let mut scheduler = Scheduler::begin(Box::new(MemoryBlobStore::new()), now());
    scheduler.configure(&new_york_config(), now());
    scheduler
}

/// Windows as (begin offset, duration) in minutes from `now`.
fn windows_strategy() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((-600i64..600, 1i64..600), 1..10)
}

proptest! {
    /// HALF exactly when some window covers now, and the change time is the
    /// end of the chained windows or the next begin.
    #[test]
    fn prop_ordered_station_matches_windows(windows in windows_strategy()) {
        let mut scheduler = configured();
        let now = now();

        let spans: Vec<(DateTime<Utc>, DateTime<Utc>)> = windows
            .iter()
            .map(|&(offset, length)| {
                let begin = now + Duration::minutes(offset);
                (begin, begin + Duration::minutes(length))
            })
            .collect();

        for (index, (begin, end)) in spans.iter().enumerate() {
            let event = EventJson::federal(index as u32 + 1, 1)
                .begin(&mark(*begin))
                .end(&mark(*end))
                .build();
            prop_assert_eq!(scheduler.submit_event(&event, now), 0);
        }

        let covering: Vec<_> = spans.iter().filter(|(b, e)| *b <= now && *e > now).collect();
        let next_begin = spans.iter().map(|(b, _)| *b).filter(|b| *b > now).min();

        if covering.is_empty() {
            prop_assert_eq!(scheduler.ordered_station(), Station::Full);
            prop_assert_eq!(scheduler.next_flag_change(), next_begin);
        } else {
            prop_assert_eq!(scheduler.ordered_station(), Station::Half);
            prop_assert_eq!(scheduler.next_flag_station(), Station::Full);
            let change = scheduler.next_flag_change().unwrap();
            for (_, end) in &covering {
                prop_assert!(change >= *end);
            }
            // Nothing is still in effect at the change.
            prop_assert!(spans.iter().all(|(b, e)| !(*b <= change && *e > change)));
        }

        if let Some(wake) = scheduler.wake_at() {
            if let Some(change) = scheduler.next_flag_change() {
                prop_assert!(wake <= change);
            }
        }
    }

    /// A later version always replaces an earlier one, whatever the order
    /// they arrive in.
    #[test]
    fn prop_highest_version_wins(versions in prop::collection::vec(0u32..50, 1..12)) {
        let mut scheduler = configured();
        let now = now();

        for version in &versions {
            let event = EventJson::federal(42, *version)
                .begin("2025-07-05 10:00Z")
                .end("2025-07-05 20:00Z")
                .build();
            prop_assert_eq!(scheduler.submit_event(&event, now), 0);
        }

        let highest = versions.iter().max().copied().unwrap_or_default();
        let list: serde_json::Value = serde_json::from_str(&scheduler.show_event_list()).unwrap();
        let expected = format!("42.{highest}");
        prop_assert_eq!(list["EVL"][0].as_str(), Some(expected.as_str()));
    }

    /// Clock marks: no suffix and `Z` are UTC, `L` is shifted by the
    /// standard offset plus an hour of DST.
    #[test]
    fn prop_clock_marks_resolve_to_utc(
        (year, month, day) in (2000i32..2100, 1u32..=12, 1u32..=28),
        (hour, minute) in (0u32..24, 0u32..60),
        offset in -12i32..=12,
        dst in any::<bool>(),
    ) {
        let config = SchedulerConfig {
            utc_offset_hours: f64::from(offset),
            dst,
            ..Default::default()
        };
        let text = format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}");
        let expected = utc(year, month, day, hour, minute);

        for mark in [text.clone(), format!("{text}Z")] {
            prop_assert_eq!(
                parse_time_mark(&mark, MarkDestination::Half, &config),
                Ok(Some(expected))
            );
        }

        let shift = Duration::hours(i64::from(offset) + i64::from(dst));
        prop_assert_eq!(
            parse_time_mark(&format!("{text}L"), MarkDestination::Full, &config),
            Ok(Some(expected - shift))
        );
    }

    /// A subscription matches any code it prefixes, regardless of case.
    #[test]
    fn prop_subscription_prefix_matches(
        subscribed in "[A-Z]{1,3}(-[A-Z]{2})?",
        suffix in "(-[A-Z0-9]{1,6}){0,2}",
    ) {
        let published = format!("{subscribed}{suffix}");
        prop_assert!(jurisdiction_matches(&published, &subscribed));
        prop_assert!(jurisdiction_matches(&published.to_lowercase(), &subscribed));
        prop_assert!(jurisdiction_matches(&published, &subscribed.to_lowercase()));
        prop_assert!(jurisdiction_matches(&published, ""));
    }

    /// A subscription longer than the published code never matches it.
    #[test]
    fn prop_longer_subscription_does_not_match(
        published in "[A-Z]{1,3}",
        extra in "-[A-Z]{1,4}",
    ) {
        let subscribed = format!("{published}{extra}");
        prop_assert!(!jurisdiction_matches(&published, &subscribed));
    }
}
