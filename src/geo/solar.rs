//! Sunrise/sunset lookup for a date and coordinate pair.
//!
//! Thin layer over the `sunrise` crate. It adds the polar day/night case,
//! which the crate reports as a meaningless instant instead of an error.

use chrono::{DateTime, NaiveDate, Utc};
use sunrise::{Coordinates, SolarDay, SolarEvent};

/// Which edge of the day to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

impl From<SunEvent> for SolarEvent {
    fn from(event: SunEvent) -> Self {
        match event {
            SunEvent::Sunrise => SolarEvent::Sunrise,
            SunEvent::Sunset => SolarEvent::Sunset,
        }
    }
}

/// Compute the UTC instant of sunrise or sunset on `date` at the given
/// coordinates.
///
/// Returns `None` for out-of-range coordinates and when the sun does not
/// cross the horizon that day (polar day or night).
///
/// The result is the absolute instant nearest that calendar day's solar noon
/// at the given longitude, so a western-hemisphere sunset may fall on the
/// next UTC date.
pub fn solar_event(date: NaiveDate, latitude: f64, longitude: f64, event: SunEvent) -> Option<DateTime<Utc>> {
    let coord = Coordinates::new(latitude, longitude)?;
    let instant = SolarDay::new(coord, date).event_time(event.into());

    // With no horizon crossing the hour angle is NaN and the crate falls
    // back to a timestamp far from `date`.
    let drift = (instant.date_naive() - date).num_days().abs();
    (drift <= 1).then_some(instant)
}

pub fn sunrise(date: NaiveDate, latitude: f64, longitude: f64) -> Option<DateTime<Utc>> {
    solar_event(date, latitude, longitude, SunEvent::Sunrise)
}

pub fn sunset(date: NaiveDate, latitude: f64, longitude: f64) -> Option<DateTime<Utc>> {
    solar_event(date, latitude, longitude, SunEvent::Sunset)
}
