//! Halyard motor controller.
//!
//! Executes one bounded move at a time: ramped PWM up to a target duty, then
//! hold until the arrival marker for the direction of travel reads present,
//! the optional absolute timeout elapses, or the sensed current reaches the
//! stall threshold. Each move ends in exactly one terminal [`MoveStatus`];
//! retries are the state machine's business.
//!
//! The controller also tracks the ordered and actual stations. The actual
//! station is only trusted while the marker that confirmed it still reads
//! present.

use serde::Serialize;

use crate::common::constants::{
    DEFAULT_ADC_MAX_COUNT, DEFAULT_ADC_REFERENCE_VOLTS, DEFAULT_CURRENT_SCALE, DEFAULT_RAMP_FLOOR_MS,
    DEFAULT_STALL_AMPS,
};
use crate::hardware::{Direction, MotorDriver, SensorSnapshot};
use crate::station::Station;
use crate::time::elapsed_ms;

/// Electrical and timing parameters of the drive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorTuning {
    pub stall_amps: f32,
    /// Amps per volt at the current-sense input.
    pub current_scale: f32,
    pub adc_reference_volts: f32,
    pub adc_max_count: u16,
    /// Shortest ramp ever used, whatever the caller asks for.
    pub ramp_floor_ms: u32,
}

impl Default for MotorTuning {
    fn default() -> Self {
        Self {
            stall_amps: DEFAULT_STALL_AMPS,
            current_scale: DEFAULT_CURRENT_SCALE,
            adc_reference_volts: DEFAULT_ADC_REFERENCE_VOLTS,
            adc_max_count: DEFAULT_ADC_MAX_COUNT,
            ramp_floor_ms: DEFAULT_RAMP_FLOOR_MS,
        }
    }
}

impl MotorTuning {
    /// Convert raw current-sense counts to amps.
    pub fn counts_to_amps(&self, counts: u16) -> f32 {
        let max = f32::from(self.adc_max_count.max(1));
        f32::from(counts) / max * self.adc_reference_volts * self.current_scale
    }
}

/// Progress or outcome of the most recent move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveStatus {
    #[default]
    None,
    MovingUp,
    MovingDown,
    OnStation,
    Cancelled,
    Timeout,
    Stall,
}

impl MoveStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MoveStatus::OnStation | MoveStatus::Cancelled | MoveStatus::Timeout | MoveStatus::Stall
        )
    }

    pub fn is_fault(self) -> bool {
        matches!(self, MoveStatus::Timeout | MoveStatus::Stall)
    }
}

/// Per-move bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorMoveState {
    pub running: bool,
    pub direction: Direction,
    pub target_speed: u8,
    pub current_speed: u8,
    pub ramp_start_ms: u32,
    pub ramp_ms: u32,
    /// Absolute move limit measured from `ramp_start_ms`; `None` is unbounded.
    pub timeout_ms: Option<u32>,
    pub stalled: bool,
    pub move_status: MoveStatus,
}

impl Default for MotorMoveState {
    fn default() -> Self {
        Self {
            running: false,
            direction: Direction::Ccw,
            target_speed: 0,
            current_speed: 0,
            ramp_start_ms: 0,
            ramp_ms: 0,
            timeout_ms: None,
            stalled: false,
            move_status: MoveStatus::None,
        }
    }
}

impl MotorMoveState {
    fn ramping(&self, now_ms: u32) -> bool {
        self.running && elapsed_ms(now_ms, self.ramp_start_ms) < self.ramp_ms
    }
}

pub struct MotorController {
    driver: Option<Box<dyn MotorDriver>>,
    tuning: MotorTuning,
    state: MotorMoveState,
    ordered: Station,
    actual: Station,
    last_direction: Option<Direction>,
    last_amps: f32,
}

impl MotorController {
    pub fn new(driver: Box<dyn MotorDriver>, tuning: MotorTuning) -> Self {
        Self {
            driver: Some(driver),
            ..Self::unconfigured(tuning)
        }
    }

    /// Controller with no motor outputs; every move request is rejected.
    pub fn unconfigured(tuning: MotorTuning) -> Self {
        Self {
            driver: None,
            tuning,
            state: MotorMoveState::default(),
            ordered: Station::Unknown,
            actual: Station::Unknown,
            last_direction: None,
            last_amps: 0.0,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.driver.is_some()
    }

    /// Start a move. Returns `false` without touching anything when no driver
    /// is attached.
    ///
    /// The ramp never runs shorter than the configured floor. A `duration_ms`
    /// of 0 disables the absolute timeout.
    pub fn run_motor(
        &mut self,
        direction: Direction,
        duration_ms: u32,
        speed: u8,
        ramp_ms: u32,
        now_ms: u32,
    ) -> bool {
        let Some(driver) = self.driver.as_mut() else {
            log_warning!("Motor move requested but no motor driver is configured");
            return false;
        };

        driver.set_duty(0);
        driver.set_direction(direction);
        driver.set_enabled(true);

        self.last_direction = Some(direction);
        self.state = MotorMoveState {
            running: true,
            direction,
            target_speed: speed,
            current_speed: 0,
            ramp_start_ms: now_ms,
            ramp_ms: ramp_ms.max(self.tuning.ramp_floor_ms),
            timeout_ms: (duration_ms > 0).then_some(duration_ms),
            stalled: false,
            move_status: if direction.is_lowering() {
                MoveStatus::MovingDown
            } else {
                MoveStatus::MovingUp
            },
        };

        log_decorated!(
            "Motor {} at speed {speed}, ramp {} ms, timeout {}",
            if direction.is_lowering() { "lowering" } else { "raising" },
            self.state.ramp_ms,
            match self.state.timeout_ms {
                Some(ms) => format!("{ms} ms"),
                None => "none".to_string(),
            }
        );
        true
    }

    /// Advance the running move by one control cycle.
    ///
    /// Returns the terminal outcome when this tick ended the move.
    pub fn update(&mut self, now_ms: u32, sensors: &SensorSnapshot) -> Option<MoveStatus> {
        if !self.state.running {
            return None;
        }
        let driver = self.driver.as_mut()?;

        // Over-current wins over every other condition.
        let counts = driver.read_current_counts();
        self.last_amps = self.tuning.counts_to_amps(counts);
        if self.last_amps >= self.tuning.stall_amps {
            log_error!(
                "Motor stall: {:.2} A at or above {:.2} A threshold",
                self.last_amps,
                self.tuning.stall_amps
            );
            self.stop_motor(MoveStatus::Stall);
            return Some(MoveStatus::Stall);
        }

        let elapsed = elapsed_ms(now_ms, self.state.ramp_start_ms);
        let speed = if self.state.ramping(now_ms) {
            let fraction = elapsed as f32 / self.state.ramp_ms as f32;
            (f32::from(self.state.target_speed) * fraction) as u8
        } else {
            self.state.target_speed
        };
        if speed != self.state.current_speed {
            self.state.current_speed = speed;
            driver.set_duty(speed);
        }

        if let Some(limit) = self.state.timeout_ms {
            if elapsed >= limit {
                log_error!("Motor move timed out after {elapsed} ms");
                self.stop_motor(MoveStatus::Timeout);
                return Some(MoveStatus::Timeout);
            }
        }

        let (arrived, station) = if self.state.direction.is_lowering() {
            (sensors.half, Station::Half)
        } else {
            (sensors.full, Station::Full)
        };
        if arrived {
            self.stop_motor(MoveStatus::OnStation);
            self.confirm_arrival(station);
            return Some(MoveStatus::OnStation);
        }

        None
    }

    /// Cut drive and record `outcome` for the state machine.
    pub fn stop_motor(&mut self, outcome: MoveStatus) {
        if let Some(driver) = self.driver.as_mut() {
            driver.set_duty(0);
            driver.set_enabled(false);
        }
        let was_running = self.state.running;
        self.state.running = false;
        self.state.current_speed = 0;
        self.state.move_status = outcome;
        if outcome == MoveStatus::Stall {
            self.state.stalled = true;
        }
        if was_running {
            log_decorated!("Motor stopped: {outcome:?}");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn move_status(&self) -> MoveStatus {
        self.state.move_status
    }

    pub fn move_state(&self) -> &MotorMoveState {
        &self.state
    }

    pub fn current_speed(&self) -> u8 {
        self.state.current_speed
    }

    pub fn last_direction(&self) -> Option<Direction> {
        self.last_direction
    }

    pub fn stall_detected(&self) -> bool {
        self.state.stalled
    }

    pub fn clear_stall(&mut self) {
        self.state.stalled = false;
    }

    pub fn stall_amps(&self) -> f32 {
        self.tuning.stall_amps
    }

    pub fn set_stall_amps(&mut self, amps: f32) {
        self.tuning.stall_amps = amps;
    }

    /// Current measured on the last update.
    pub fn last_current_amps(&self) -> f32 {
        self.last_amps
    }

    pub fn tuning(&self) -> &MotorTuning {
        &self.tuning
    }

    /// Actual station, downgraded to `Unknown` when its marker no longer
    /// reads present.
    pub fn actual_station(&mut self, sensors: &SensorSnapshot) -> Station {
        let confirmed = match self.actual {
            Station::Full => sensors.full,
            Station::Half => sensors.half,
            Station::Unknown => true,
        };
        if !confirmed {
            log_warning!("{} marker lost; station now unknown", self.actual);
            self.actual = Station::Unknown;
        }
        self.actual
    }

    /// Last recorded actual station, without re-validation.
    pub fn recorded_station(&self) -> Station {
        self.actual
    }

    pub fn invalidate_station(&mut self) {
        self.actual = Station::Unknown;
    }

    pub fn confirm_arrival(&mut self, station: Station) {
        self.actual = station;
    }

    pub fn ordered_station(&self) -> Station {
        self.ordered
    }

    pub fn set_ordered_station(&mut self, station: Station) {
        self.ordered = station;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct DriverLog {
        direction: Option<Direction>,
        duty: u8,
        duties: Vec<u8>,
        enabled: bool,
        counts: u16,
    }

    #[derive(Clone, Default)]
    struct FakeDriver(Arc<Mutex<DriverLog>>);

    impl FakeDriver {
        fn set_counts(&self, counts: u16) {
            self.0.lock().unwrap().counts = counts;
        }
    }

    impl MotorDriver for FakeDriver {
        fn set_direction(&mut self, direction: Direction) {
            self.0.lock().unwrap().direction = Some(direction);
        }

        fn set_duty(&mut self, duty: u8) {
            let mut log = self.0.lock().unwrap();
            log.duty = duty;
            log.duties.push(duty);
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.0.lock().unwrap().enabled = enabled;
        }

        fn read_current_counts(&mut self) -> u16 {
            self.0.lock().unwrap().counts
        }
    }

    fn controller() -> (MotorController, FakeDriver) {
        let driver = FakeDriver::default();
        let controller = MotorController::new(Box::new(driver.clone()), MotorTuning::default());
        (controller, driver)
    }

    fn no_markers() -> SensorSnapshot {
        SensorSnapshot::default()
    }

    #[test]
    fn test_stall_on_first_tick_wins() {
        let (mut motor, driver) = controller();
        driver.set_counts(4095);
        assert!(motor.run_motor(Direction::Ccw, 120_000, 255, 1_000, 0));

        let full = SensorSnapshot {
            full: true,
            ..Default::default()
        };
        assert_eq!(motor.update(20, &full), Some(MoveStatus::Stall));
        assert!(!motor.is_running());
        assert!(motor.stall_detected());
        assert_eq!(motor.move_status(), MoveStatus::Stall);

        let log = driver.0.lock().unwrap();
        assert!(!log.enabled);
        assert_eq!(log.duty, 0);
    }

    #[test]
    fn test_ramp_respects_floor() {
        let (mut motor, _driver) = controller();
        motor.run_motor(Direction::Cw, 0, 200, 10, 1_000);
        assert_eq!(motor.move_state().ramp_ms, DEFAULT_RAMP_FLOOR_MS);

        motor.update(1_250, &no_markers());
        assert_eq!(motor.current_speed(), 100);
        motor.update(1_499, &no_markers());
        assert!(motor.current_speed() < 200);
        motor.update(1_500, &no_markers());
        assert_eq!(motor.current_speed(), 200);
    }

    #[test]
    fn test_timeout_and_unbounded_moves() {
        let (mut motor, _driver) = controller();
        motor.run_motor(Direction::Ccw, 2_000, 255, 500, 0);
        assert_eq!(motor.update(1_999, &no_markers()), None);
        assert_eq!(motor.update(2_000, &no_markers()), Some(MoveStatus::Timeout));
        assert!(!motor.stall_detected());

        motor.run_motor(Direction::Ccw, 0, 255, 500, 0);
        assert_eq!(motor.update(1_000_000, &no_markers()), None);
        assert!(motor.is_running());
    }

    #[test]
    fn test_arrival_uses_marker_for_direction() {
        let (mut motor, _driver) = controller();
        let full_only = SensorSnapshot {
            full: true,
            ..Default::default()
        };
        let half_only = SensorSnapshot {
            half: true,
            ..Default::default()
        };

        motor.run_motor(Direction::Cw, 0, 255, 500, 0);
        assert_eq!(motor.move_status(), MoveStatus::MovingDown);
        assert_eq!(motor.update(100, &full_only), None);
        assert_eq!(motor.update(120, &half_only), Some(MoveStatus::OnStation));
        assert_eq!(motor.actual_station(&half_only), Station::Half);

        motor.run_motor(Direction::Ccw, 0, 255, 500, 200);
        assert_eq!(motor.last_direction(), Some(Direction::Ccw));
        assert_eq!(motor.update(300, &full_only), Some(MoveStatus::OnStation));
        assert_eq!(motor.actual_station(&full_only), Station::Full);
    }

    #[test]
    fn test_actual_station_revalidates() {
        let (mut motor, _driver) = controller();
        motor.confirm_arrival(Station::Full);
        assert_eq!(motor.actual_station(&no_markers()), Station::Unknown);
        assert_eq!(motor.recorded_station(), Station::Unknown);
    }

    #[test]
    fn test_unconfigured_rejects_moves() {
        let mut motor = MotorController::unconfigured(MotorTuning::default());
        assert!(!motor.run_motor(Direction::Ccw, 1_000, 255, 500, 0));
        assert!(!motor.is_running());
        assert_eq!(motor.update(10, &no_markers()), None);
        assert_eq!(motor.move_status(), MoveStatus::None);
    }

    #[test]
    fn test_counter_wraparound() {
        let (mut motor, _driver) = controller();
        let start = u32::MAX - 100;
        motor.run_motor(Direction::Ccw, 1_000, 255, 500, start);
        assert_eq!(motor.update(start.wrapping_add(999), &no_markers()), None);
        assert_eq!(motor.current_speed(), 255);
        assert_eq!(
            motor.update(start.wrapping_add(1_000), &no_markers()),
            Some(MoveStatus::Timeout)
        );
    }

    #[test]
    fn test_counts_to_amps() {
        let tuning = MotorTuning::default();
        assert!((tuning.counts_to_amps(4095) - 6.6).abs() < 1e-4);
        assert_eq!(tuning.counts_to_amps(0), 0.0);
    }
}
