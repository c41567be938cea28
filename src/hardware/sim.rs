//! Simulated halyard rig.
//!
//! Flag position runs from 0 (HALF marker) to 1000 (FULL marker) and moves in
//! proportion to motor duty, integrated lazily against the shared clock.
//! Driving into either end stop, or into a jam, draws stall-level current.

use std::sync::{Arc, Mutex};

use super::{Direction, MotorDriver, SensorInputs};
use crate::common::constants::{DEFAULT_ADC_MAX_COUNT, DEFAULT_ADC_REFERENCE_VOLTS, DEFAULT_CURRENT_SCALE};
use crate::station::Station;
use crate::time::{Clock, elapsed_ms};

pub const POSITION_HALF: f64 = 0.0;
pub const POSITION_FULL: f64 = 1000.0;

/// Markers read present within this distance of their end.
const MARKER_WINDOW: f64 = 20.0;
/// Travel per millisecond at full duty: end to end in 20 s.
const TRAVEL_PER_MS: f64 = 0.05;
const RUNNING_AMPS: f64 = 0.6;
const STALL_AMPS: f64 = 3.0;

struct RigState {
    position: f64,
    direction: Direction,
    duty: u8,
    enabled: bool,
    jammed: bool,
    forced_counts: Option<u16>,
    lid_open: bool,
    full_marker_working: bool,
    half_marker_working: bool,
    last_ms: u32,
    enable_count: u32,
}

impl RigState {
    fn pushing_end_stop(&self) -> bool {
        match self.direction {
            Direction::Ccw => self.position >= POSITION_FULL,
            Direction::Cw => self.position <= POSITION_HALF,
        }
    }

    fn driving(&self) -> bool {
        self.enabled && self.duty > 0
    }
}

fn amps_to_counts(amps: f64) -> u16 {
    let volts = amps / f64::from(DEFAULT_CURRENT_SCALE);
    let counts = volts / f64::from(DEFAULT_ADC_REFERENCE_VOLTS) * f64::from(DEFAULT_ADC_MAX_COUNT);
    counts.round().clamp(0.0, f64::from(DEFAULT_ADC_MAX_COUNT)) as u16
}

/// Control handle for the rig; clones share the same rig.
#[derive(Clone)]
pub struct SimRig {
    state: Arc<Mutex<RigState>>,
    clock: Arc<dyn Clock>,
}

impl SimRig {
    /// New rig with the flag at `position` (clamped to the travel range).
    pub fn new(clock: Arc<dyn Clock>, position: f64) -> Self {
        let last_ms = clock.millis();
        Self {
            state: Arc::new(Mutex::new(RigState {
                position: position.clamp(POSITION_HALF, POSITION_FULL),
                direction: Direction::Ccw,
                duty: 0,
                enabled: false,
                jammed: false,
                forced_counts: None,
                lid_open: false,
                full_marker_working: true,
                half_marker_working: true,
                last_ms,
                enable_count: 0,
            })),
            clock,
        }
    }

    pub fn at_station(clock: Arc<dyn Clock>, station: Station) -> Self {
        let position = match station {
            Station::Half => POSITION_HALF,
            Station::Full => POSITION_FULL,
            Station::Unknown => (POSITION_FULL + POSITION_HALF) / 2.0,
        };
        Self::new(clock, position)
    }

    /// Motor driver handle.
    pub fn motor(&self) -> SimMotor {
        SimMotor { rig: self.clone() }
    }

    /// Sensor handle.
    pub fn sensors(&self) -> SimSensors {
        SimSensors { rig: self.clone() }
    }

    /// Integrate motion up to the clock's current time and run `f` on the state.
    fn with_state<R>(&self, f: impl FnOnce(&mut RigState) -> R) -> R {
        let now = self.clock.millis();
        let mut state = self.state.lock().unwrap();
        let dt = f64::from(elapsed_ms(now, state.last_ms));
        state.last_ms = now;

        if state.driving() && !state.jammed {
            let travel = dt * TRAVEL_PER_MS * f64::from(state.duty) / 255.0;
            let delta = match state.direction {
                Direction::Ccw => travel,
                Direction::Cw => -travel,
            };
            state.position = (state.position + delta).clamp(POSITION_HALF, POSITION_FULL);
        }

        f(&mut state)
    }

    pub fn position(&self) -> f64 {
        self.with_state(|s| s.position)
    }

    pub fn set_position(&self, position: f64) {
        self.with_state(|s| s.position = position.clamp(POSITION_HALF, POSITION_FULL));
    }

    pub fn is_driving(&self) -> bool {
        self.with_state(|s| s.driving())
    }

    /// How many times the motor has been enabled.
    pub fn enable_count(&self) -> u32 {
        self.with_state(|s| s.enable_count)
    }

    /// Block the halyard: no motion, stall current while driven.
    pub fn jam(&self) {
        self.with_state(|s| s.jammed = true);
    }

    pub fn unjam(&self) {
        self.with_state(|s| s.jammed = false);
    }

    /// Override the current-sense reading.
    pub fn force_current_counts(&self, counts: Option<u16>) {
        self.with_state(|s| s.forced_counts = counts);
    }

    pub fn open_lid(&self) {
        self.with_state(|s| s.lid_open = true);
    }

    pub fn close_lid(&self) {
        self.with_state(|s| s.lid_open = false);
    }

    /// Make a marker sensor read absent regardless of position.
    pub fn disable_marker(&self, station: Station) {
        self.with_state(|s| match station {
            Station::Full => s.full_marker_working = false,
            Station::Half => s.half_marker_working = false,
            Station::Unknown => {}
        });
    }

    pub fn enable_marker(&self, station: Station) {
        self.with_state(|s| match station {
            Station::Full => s.full_marker_working = true,
            Station::Half => s.half_marker_working = true,
            Station::Unknown => {}
        });
    }
}

/// [`MotorDriver`] over a [`SimRig`].
pub struct SimMotor {
    rig: SimRig,
}

impl MotorDriver for SimMotor {
    fn set_direction(&mut self, direction: Direction) {
        self.rig.with_state(|s| s.direction = direction);
    }

    fn set_duty(&mut self, duty: u8) {
        self.rig.with_state(|s| s.duty = duty);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.rig.with_state(|s| {
            if enabled && !s.enabled {
                s.enable_count += 1;
            }
            s.enabled = enabled;
        });
    }

    fn read_current_counts(&mut self) -> u16 {
        self.rig.with_state(|s| {
            if let Some(counts) = s.forced_counts {
                return counts;
            }
            if !s.driving() {
                return 0;
            }
            let amps = if s.jammed || s.pushing_end_stop() {
                STALL_AMPS
            } else {
                RUNNING_AMPS * f64::from(s.duty) / 255.0
            };
            amps_to_counts(amps)
        })
    }
}

/// [`SensorInputs`] over a [`SimRig`].
pub struct SimSensors {
    rig: SimRig,
}

impl SensorInputs for SimSensors {
    fn full_marker_present(&self) -> bool {
        self.rig
            .with_state(|s| s.full_marker_working && s.position >= POSITION_FULL - MARKER_WINDOW)
    }

    fn half_marker_present(&self) -> bool {
        self.rig
            .with_state(|s| s.half_marker_working && s.position <= POSITION_HALF + MARKER_WINDOW)
    }

    fn lid_open(&self) -> bool {
        self.rig.with_state(|s| s.lid_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SimulatedClock;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn clock() -> Arc<SimulatedClock> {
        Arc::new(SimulatedClock::new(Utc.with_ymd_and_hms(2025, 7, 4, 12, 0, 0).unwrap()))
    }

    #[test]
    fn test_motion_follows_duty_and_direction() {
        let clock = clock();
        let rig = SimRig::new(clock.clone(), 500.0);
        let mut motor = rig.motor();

        motor.set_direction(Direction::Ccw);
        motor.set_enabled(true);
        motor.set_duty(255);
        clock.advance(Duration::from_secs(2));
        assert!((rig.position() - 600.0).abs() < 1e-6);

        motor.set_direction(Direction::Cw);
        motor.set_duty(51);
        clock.advance(Duration::from_secs(10));
        assert!((rig.position() - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_markers_and_end_stop_current() {
        let clock = clock();
        let rig = SimRig::at_station(clock.clone(), Station::Full);
        let sensors = rig.sensors();
        let mut motor = rig.motor();

        assert!(sensors.full_marker_present());
        assert!(!sensors.half_marker_present());

        motor.set_direction(Direction::Ccw);
        motor.set_enabled(true);
        motor.set_duty(255);
        assert_eq!(motor.read_current_counts(), amps_to_counts(STALL_AMPS));

        motor.set_direction(Direction::Cw);
        assert_eq!(motor.read_current_counts(), amps_to_counts(RUNNING_AMPS));
    }

    #[test]
    fn test_fault_injection() {
        let clock = clock();
        let rig = SimRig::new(clock.clone(), 500.0);
        let mut motor = rig.motor();
        motor.set_enabled(true);
        motor.set_duty(255);

        rig.jam();
        clock.advance(Duration::from_secs(1));
        assert_eq!(rig.position(), 500.0);
        assert_eq!(motor.read_current_counts(), amps_to_counts(STALL_AMPS));

        rig.force_current_counts(Some(7));
        assert_eq!(motor.read_current_counts(), 7);

        rig.set_position(0.0);
        rig.disable_marker(Station::Half);
        assert!(!rig.sensors().half_marker_present());

        rig.open_lid();
        assert!(rig.sensors().lid_open());
        assert_eq!(rig.enable_count(), 1);
    }
}
