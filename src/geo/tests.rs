// Solar lookup tests
#[cfg(test)]
mod solar_tests {
    use crate::geo::solar::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_sunrise_precedes_sunset_across_locations() {
        let locations = [
            ("New York", 40.7128, -74.0060),
            ("London", 51.5074, -0.1278),
            ("Sydney", -33.8688, 151.2093),
            ("Singapore", 1.3521, 103.8198),
            ("Anchorage", 61.2181, -149.9003),
        ];
        let dates = [
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 21).unwrap(),
        ];

        for (name, lat, lng) in locations {
            for date in dates {
                let rise = sunrise(date, lat, lng).unwrap();
                let set = sunset(date, lat, lng).unwrap();
                assert!(rise < set, "{name} {date}: {rise} not before {set}");
                let hours = (set - rise).num_hours();
                assert!((5..=20).contains(&hours), "{name} {date}: day of {hours}h");
            }
        }
    }

    #[test]
    fn test_out_of_range_coordinates_have_no_event() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 4).unwrap();
        assert!(sunrise(date, 95.0, 0.0).is_none());
        assert!(sunset(date, 0.0, 200.0).is_none());
    }

    #[test]
    fn test_new_york_independence_day() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 4).unwrap();
        let rise = sunrise(date, 40.7128, -74.0060).unwrap();
        let set = sunset(date, 40.7128, -74.0060).unwrap();

        // Sunrise around 05:30 EDT, i.e. 09:30 UTC on the same date.
        assert_eq!(rise.date_naive(), date);
        assert!((9..=10).contains(&rise.hour()), "sunrise at {rise}");

        // Sunset around 20:30 EDT lands on the next UTC date.
        assert_eq!(set.date_naive(), date.succ_opt().unwrap());
        assert_eq!(set.hour(), 0);
        assert!(set > rise);
    }

    #[test]
    fn test_sydney_sunrise_precedes_utc_midnight() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        let rise = sunrise(date, -33.8688, 151.2093).unwrap();

        // About 07:00 AEST, which is 21:00 UTC on the previous date.
        assert_eq!(rise.date_naive(), date.pred_opt().unwrap());
        assert!((20..=21).contains(&rise.hour()), "sunrise at {rise}");
    }

    #[test]
    fn test_polar_day_and_night_have_no_event() {
        let june = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        let december = NaiveDate::from_ymd_opt(2025, 12, 21).unwrap();

        // Svalbard: midnight sun in June, polar night in December.
        assert!(sunrise(june, 78.22, 15.65).is_none());
        assert!(sunset(june, 78.22, 15.65).is_none());
        assert!(sunrise(december, 78.22, 15.65).is_none());
    }

    #[test]
    fn test_equator_day_length_near_twelve_hours() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        let rise = solar_event(date, 0.0, 0.0, SunEvent::Sunrise).unwrap();
        let set = solar_event(date, 0.0, 0.0, SunEvent::Sunset).unwrap();

        let minutes = (set - rise).num_minutes();
        assert!((720..=735).contains(&minutes), "day length {minutes} min");
        assert_eq!(rise.date_naive(), date);
    }
}
