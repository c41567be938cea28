//! Astronomical sunrise/sunset support for sun-relative time marks.
//!
//! - [`solar`]: pure solar-position calculation for a date and coordinate pair

pub mod solar;

pub use solar::{SunEvent, solar_event, sunrise, sunset};

#[cfg(test)]
mod tests;
