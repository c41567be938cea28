//! Compact time-mark parsing.
//!
//! | Form                | Len | Meaning                                        |
//! |---------------------|-----|------------------------------------------------|
//! | `YYYY-MM-DD`        | 10  | sunrise (H destination) or sunset (F)          |
//! | `YYYY-MM-DD SR`     | 13  | sunrise on that date                           |
//! | `YYYY-MM-DD SS`     | 13  | sunset on that date                            |
//! | `YYYY-MM-DD HH:MM`  | 16  | clock time, UTC                                |
//! | `YYYY-MM-DD HH:MMZ` | 17  | clock time, explicit UTC                       |
//! | `YYYY-MM-DD HH:MML` | 17  | local clock time (configured offset and DST)   |
//! | `TBD`               | 3   | unset                                          |

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use super::errors::TimeMarkError;
use super::settings::SchedulerConfig;
use crate::geo::{SunEvent, solar_event};

/// Where the flag goes when a mark is reached; picks the sun event for a
/// bare date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkDestination {
    /// Begin marks: flags go to half-staff, by default at sunrise.
    Half,
    /// End marks: flags return to full, by default at sunset.
    Full,
}

impl MarkDestination {
    pub fn from_code(code: char) -> Result<Self, TimeMarkError> {
        match code.to_ascii_uppercase() {
            'H' => Ok(MarkDestination::Half),
            'F' => Ok(MarkDestination::Full),
            other => Err(TimeMarkError::NotHalfOrFull(other)),
        }
    }

    fn default_sun_event(self) -> SunEvent {
        match self {
            MarkDestination::Half => SunEvent::Sunrise,
            MarkDestination::Full => SunEvent::Sunset,
        }
    }
}

const UNSET_MARK: &str = "TBD";

/// Resolve a time mark to a UTC instant.
///
/// `Ok(None)` means the mark is `TBD` (unset). Every other failure is an
/// error; callers must treat it as invalidating the event rather than as
/// "no time".
pub fn parse_time_mark(
    mark: &str,
    destination: MarkDestination,
    config: &SchedulerConfig,
) -> Result<Option<DateTime<Utc>>, TimeMarkError> {
    if mark == UNSET_MARK {
        return Ok(None);
    }

    let malformed = || TimeMarkError::Malformed(mark.to_string());

    if !matches!(mark.len(), 10 | 13 | 16 | 17) {
        return Err(malformed());
    }

    let date = mark
        .get(..10)
        .and_then(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok())
        .ok_or_else(malformed)?;

    if mark.len() == 10 {
        return sun_instant(date, destination.default_sun_event(), config).map(Some);
    }

    if mark.as_bytes()[10] != b' ' {
        return Err(malformed());
    }

    if mark.len() == 13 {
        let suffix = mark.get(11..13).ok_or_else(malformed)?;
        let event = match suffix {
            "SR" => SunEvent::Sunrise,
            "SS" => SunEvent::Sunset,
            other => return Err(TimeMarkError::NotSunriseSunset(other.to_string())),
        };
        return sun_instant(date, event, config).map(Some);
    }

    let time = mark
        .get(11..16)
        .and_then(|text| NaiveTime::parse_from_str(text, "%H:%M").ok())
        .ok_or_else(malformed)?;
    let clock = date.and_time(time).and_utc();

    if mark.len() == 16 {
        return Ok(Some(clock));
    }

    match mark[16..].chars().next() {
        Some('Z') => Ok(Some(clock)),
        Some('L') => config
            .local_offset()
            .and_then(|offset| clock.checked_sub_signed(offset))
            .map(Some)
            .ok_or_else(malformed),
        Some(other) => Err(TimeMarkError::NotZuluLocal(other)),
        None => Err(malformed()),
    }
}

fn sun_instant(date: NaiveDate, event: SunEvent, config: &SchedulerConfig) -> Result<DateTime<Utc>, TimeMarkError> {
    solar_event(date, config.latitude, config.longitude, event).ok_or(TimeMarkError::BadSunEvent)
}
