//! The control cycle.
//!
//! [`ControlLoop`] wires the scheduler, motor controller, state machine,
//! sensors, annunciator and clock together by explicit construction. One
//! [`ControlLoop::tick`] runs, in order: scheduler housekeeping, sensor poll
//! with the lid interlock, motor update, state machine update and tone
//! playback.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use crate::common::constants::DEFAULT_TICK_INTERVAL_MS;
use crate::fsm::{FlagState, FlagStateMachine, FsmContext, MoveSettings, Transition};
use crate::hardware::{Annunciator, SensorInputs, SensorSnapshot, Tone};
use crate::motor::{MotorController, MoveStatus};
use crate::schedule::Scheduler;
use crate::station::Station;
use crate::time::{Clock, elapsed_ms};

/// Longest a blocking tone wait may hold the cycle.
const MAX_TONE_WAIT_MS: u32 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub tick_interval_ms: u32,
    pub moves: MoveSettings,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            moves: MoveSettings::default(),
        }
    }
}

/// Read-only view for dashboards and `show` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HalyardStatus {
    pub state: FlagState,
    pub ordered: Station,
    pub actual: Station,
    pub move_status: MoveStatus,
    pub running: bool,
    pub stall_detected: bool,
}

pub struct ControlLoop {
    scheduler: Scheduler,
    motor: MotorController,
    fsm: FlagStateMachine,
    sensors: Box<dyn SensorInputs>,
    annunciator: Box<dyn Annunciator>,
    clock: Arc<dyn Clock>,
    settings: LoopSettings,
    snapshot: SensorSnapshot,
}

impl ControlLoop {
    pub fn new(
        scheduler: Scheduler,
        motor: MotorController,
        sensors: Box<dyn SensorInputs>,
        annunciator: Box<dyn Annunciator>,
        clock: Arc<dyn Clock>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            scheduler,
            motor,
            fsm: FlagStateMachine::new(),
            sensors,
            annunciator,
            clock,
            settings,
            snapshot: SensorSnapshot::default(),
        }
    }

    /// Play the power-on chime and wait for it.
    pub fn start(&mut self) {
        log_block_start!("Control loop starting, tick {} ms", self.settings.tick_interval_ms);
        self.annunciator.play(Tone::PowerOn, self.clock.millis());
        self.wait_for_tone();
    }

    /// Run one control cycle. Returns the state transition it caused, if any.
    pub fn tick(&mut self) -> Option<Transition> {
        self.housekeeping();

        self.snapshot = SensorSnapshot::read(self.sensors.as_ref());
        let now_ms = self.clock.millis();

        let forced = if self.snapshot.lid_open && self.fsm.state() != FlagState::LidOpen {
            let mut ctx = FsmContext {
                motor: &mut self.motor,
                sensors: self.snapshot,
                now_ms,
                moves: self.settings.moves,
            };
            self.fsm.force(FlagState::LidOpen, &mut ctx)
        } else {
            None
        };
        if let Some(transition) = forced {
            self.announce(transition);
        }

        match self.motor.update(now_ms, &self.snapshot) {
            Some(MoveStatus::Stall) => self.annunciator.play(Tone::Stall, now_ms),
            Some(MoveStatus::Timeout) => self.annunciator.play(Tone::Timeout, now_ms),
            _ => {}
        }

        let mut ctx = FsmContext {
            motor: &mut self.motor,
            sensors: self.snapshot,
            now_ms,
            moves: self.settings.moves,
        };
        let updated = self.fsm.update(&mut ctx);
        if let Some(transition) = updated {
            self.announce(transition);
        }

        self.annunciator.update(self.clock.millis());
        updated.or(forced)
    }

    fn housekeeping(&mut self) {
        let now = self.clock.utc_now();
        if self.scheduler.needs_attention(now) {
            self.scheduler.refresh(now);
        }

        let ordered = self.scheduler.ordered_station();
        if ordered != self.motor.ordered_station() {
            log_decorated!("Ordered station now {ordered}");
            self.motor.set_ordered_station(ordered);
        }
    }

    fn announce(&mut self, transition: Transition) {
        let now_ms = self.clock.millis();
        let tone = match transition.to {
            FlagState::Startup => Tone::Startup,
            FlagState::Calibration => Tone::Calibration,
            FlagState::OnStation if transition.from == FlagState::MovingToStation => {
                match self.motor.recorded_station() {
                    Station::Half => Tone::Half,
                    _ => Tone::Full,
                }
            }
            FlagState::OnStation => Tone::OnStation,
            FlagState::MovingToStation => match self.motor.ordered_station() {
                Station::Half => Tone::FlagDown,
                _ => Tone::FlagUp,
            },
            FlagState::LidOpen => Tone::LidOpen,
            FlagState::FaultRecovery => {
                // The stall/timeout tone from the motor outcome is already playing.
                if !self.annunciator.is_finished() {
                    return;
                }
                Tone::FaultRecovery
            }
        };
        self.annunciator.play(tone, now_ms);

        if transition.from == FlagState::MovingToStation && transition.to == FlagState::OnStation {
            self.wait_for_tone();
        }
    }

    /// Block until the current tone finishes, still servicing sensors and
    /// the motor every tick.
    pub fn wait_for_tone(&mut self) {
        let started = self.clock.millis();
        let tick = StdDuration::from_millis(u64::from(self.settings.tick_interval_ms));

        while !self.annunciator.is_finished() {
            if elapsed_ms(self.clock.millis(), started) >= MAX_TONE_WAIT_MS {
                log_warning!("Tone did not finish in {MAX_TONE_WAIT_MS} ms");
                break;
            }
            self.clock.sleep(tick);

            let now_ms = self.clock.millis();
            self.snapshot = SensorSnapshot::read(self.sensors.as_ref());
            self.motor.update(now_ms, &self.snapshot);
            self.annunciator.update(now_ms);
        }
    }

    /// Tick until `shutdown` is set, then stop the motor.
    pub fn run_until(&mut self, shutdown: &AtomicBool) {
        self.start();
        let tick = StdDuration::from_millis(u64::from(self.settings.tick_interval_ms));

        while !shutdown.load(Ordering::SeqCst) {
            self.tick();
            self.clock.sleep(tick);
        }

        if self.motor.is_running() {
            self.motor.stop_motor(MoveStatus::Cancelled);
        }
        self.annunciator.play(Tone::Stop, self.clock.millis());
        log_block_start!("Control loop stopped in {}", self.fsm.state());
    }

    pub fn status(&self) -> HalyardStatus {
        HalyardStatus {
            state: self.fsm.state(),
            ordered: self.motor.ordered_station(),
            actual: self.motor.recorded_station(),
            move_status: self.motor.move_status(),
            running: self.motor.is_running(),
            stall_detected: self.motor.stall_detected(),
        }
    }

    pub fn state(&self) -> FlagState {
        self.fsm.state()
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        self.snapshot
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Commands applied here take effect on the next tick.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn motor(&self) -> &MotorController {
        &self.motor
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
