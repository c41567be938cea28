//! Hardware seams: motor driver, position/lid sensors and the tone annunciator.
//!
//! The control core only talks to these traits. Board bindings implement them
//! for real pins; [`sim`] implements them over a simulated halyard.

pub mod sim;
pub mod tones;

pub use tones::{Annunciator, LoggingAnnunciator, SilentAnnunciator, Tone};

use serde::Serialize;

/// Motor rotation. Lowering the flag turns the drum clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Lowers the flag toward the HALF marker.
    Cw,
    /// Raises the flag toward the FULL marker.
    Ccw,
}

impl Direction {
    pub fn is_lowering(self) -> bool {
        self == Direction::Cw
    }
}

/// H-bridge style motor output with a current-sense input.
pub trait MotorDriver: Send {
    fn set_direction(&mut self, direction: Direction);

    /// PWM duty, 0 = off, 255 = full drive.
    fn set_duty(&mut self, duty: u8);

    fn set_enabled(&mut self, enabled: bool);

    /// Raw ADC counts from the current-sense amplifier.
    fn read_current_counts(&mut self) -> u16;
}

/// Debounced digital inputs.
pub trait SensorInputs: Send {
    fn full_marker_present(&self) -> bool;

    fn half_marker_present(&self) -> bool;

    fn lid_open(&self) -> bool;
}

/// Sensor state sampled once per control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SensorSnapshot {
    pub full: bool,
    pub half: bool,
    pub lid_open: bool,
}

impl SensorSnapshot {
    pub fn read(inputs: &dyn SensorInputs) -> Self {
        Self {
            full: inputs.full_marker_present(),
            half: inputs.half_marker_present(),
            lid_open: inputs.lid_open(),
        }
    }
}
