//! Operational state machine for the halyard.
//!
//! ```text
//!   STARTUP ──► CALIBRATION ──► ON_STATION ◄──────────┐
//!                   ▲  │            │ ordered≠actual  │ arrived
//!                   │  └──────────► MOVING_TO_STATION ┘
//!                   │                │ stall/timeout
//!                   │ dwell          ▼
//!                   └──────── FAULT_RECOVERY
//!
//!   any ── lid open ──► LID_OPEN ── lid closed ──► CALIBRATION
//! ```
//!
//! Each tick calls `on_update` for the current state. A returned state
//! triggers `on_exit` for the current one and `on_enter` for the next. All
//! handlers get an [`FsmContext`] holding the motor controller, this cycle's
//! sensor snapshot and the millisecond counter. Handlers never block.

use serde::Serialize;
use std::fmt;

use crate::common::constants::{
    DEFAULT_FAULT_DWELL_MS, DEFAULT_MOVE_RAMP_MS, DEFAULT_MOVE_SPEED, DEFAULT_MOVE_TIMEOUT_MS,
};
use crate::hardware::{Direction, SensorSnapshot};
use crate::motor::{MotorController, MoveStatus};
use crate::station::Station;
use crate::time::elapsed_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagState {
    Startup,
    Calibration,
    OnStation,
    MovingToStation,
    LidOpen,
    FaultRecovery,
}

impl fmt::Display for FlagState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlagState::Startup => "STARTUP",
            FlagState::Calibration => "CALIBRATION",
            FlagState::OnStation => "ON_STATION",
            FlagState::MovingToStation => "MOVING_TO_STATION",
            FlagState::LidOpen => "LID_OPEN",
            FlagState::FaultRecovery => "FAULT_RECOVERY",
        };
        write!(f, "{name}")
    }
}

/// Parameters for the moves the state machine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSettings {
    pub ramp_ms: u32,
    pub timeout_ms: u32,
    pub speed: u8,
    /// Time spent in FAULT_RECOVERY before recalibrating.
    pub fault_dwell_ms: u32,
}

impl Default for MoveSettings {
    fn default() -> Self {
        Self {
            ramp_ms: DEFAULT_MOVE_RAMP_MS,
            timeout_ms: DEFAULT_MOVE_TIMEOUT_MS,
            speed: DEFAULT_MOVE_SPEED,
            fault_dwell_ms: DEFAULT_FAULT_DWELL_MS,
        }
    }
}

/// Everything a state handler may touch.
pub struct FsmContext<'a> {
    pub motor: &'a mut MotorController,
    pub sensors: SensorSnapshot,
    pub now_ms: u32,
    pub moves: MoveSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: FlagState,
    pub to: FlagState,
}

pub struct FlagStateMachine {
    state: FlagState,
    entered_ms: u32,
    started: bool,
    /// Station the in-flight move is heading for.
    move_target: Station,
    move_started: bool,
}

impl Default for FlagStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagStateMachine {
    pub fn new() -> Self {
        Self {
            state: FlagState::Startup,
            entered_ms: 0,
            started: false,
            move_target: Station::Unknown,
            move_started: false,
        }
    }

    pub fn state(&self) -> FlagState {
        self.state
    }

    /// Milliseconds spent in the current state.
    pub fn time_in_state(&self, now_ms: u32) -> u32 {
        elapsed_ms(now_ms, self.entered_ms)
    }

    /// Run one tick of the current state.
    pub fn update(&mut self, ctx: &mut FsmContext<'_>) -> Option<Transition> {
        if !self.started {
            self.started = true;
            self.entered_ms = ctx.now_ms;
            self.on_enter(ctx);
        }

        let next = self.on_update(ctx)?;
        Some(self.transition(next, ctx))
    }

    /// Move to `state` from outside the normal update flow (lid interlock).
    pub fn force(&mut self, state: FlagState, ctx: &mut FsmContext<'_>) -> Option<Transition> {
        if self.state == state {
            return None;
        }
        self.started = true;
        Some(self.transition(state, ctx))
    }

    fn transition(&mut self, next: FlagState, ctx: &mut FsmContext<'_>) -> Transition {
        let from = self.state;
        self.on_exit(ctx);
        self.state = next;
        self.entered_ms = ctx.now_ms;
        log_block_start!("State {from} → {next}");
        self.on_enter(ctx);
        Transition { from, to: next }
    }

    fn on_enter(&mut self, ctx: &mut FsmContext<'_>) {
        match self.state {
            FlagState::Startup | FlagState::Calibration | FlagState::OnStation => {}
            FlagState::MovingToStation => self.start_move(ctx),
            FlagState::LidOpen => {
                if ctx.motor.is_running() {
                    ctx.motor.stop_motor(MoveStatus::Cancelled);
                }
                ctx.motor.invalidate_station();
                log_warning!("Lid open: motion inhibited until closed");
            }
            FlagState::FaultRecovery => {
                log_error!(
                    "Move failed ({:?}); retrying in {} s",
                    ctx.motor.move_status(),
                    ctx.moves.fault_dwell_ms / 1_000
                );
            }
        }
    }

    fn on_update(&mut self, ctx: &mut FsmContext<'_>) -> Option<FlagState> {
        match self.state {
            FlagState::Startup => Some(FlagState::Calibration),
            FlagState::Calibration => Some(calibrate(ctx)),
            FlagState::OnStation => {
                let actual = ctx.motor.actual_station(&ctx.sensors);
                (actual != ctx.motor.ordered_station()).then_some(FlagState::MovingToStation)
            }
            FlagState::MovingToStation => self.monitor_move(ctx),
            FlagState::LidOpen => (!ctx.sensors.lid_open).then_some(FlagState::Calibration),
            FlagState::FaultRecovery => (elapsed_ms(ctx.now_ms, self.entered_ms) >= ctx.moves.fault_dwell_ms)
                .then_some(FlagState::Calibration),
        }
    }

    fn on_exit(&mut self, ctx: &mut FsmContext<'_>) {
        match self.state {
            FlagState::MovingToStation => {
                if ctx.motor.is_running() {
                    ctx.motor.stop_motor(MoveStatus::Cancelled);
                }
                self.move_started = false;
            }
            FlagState::FaultRecovery => ctx.motor.clear_stall(),
            _ => {}
        }
    }

    fn start_move(&mut self, ctx: &mut FsmContext<'_>) {
        self.move_target = ctx.motor.ordered_station();
        let direction = match self.move_target {
            Station::Half => Direction::Cw,
            _ => Direction::Ccw,
        };
        log_decorated!("Moving flag to {}", self.move_target);
        self.move_started = ctx.motor.run_motor(
            direction,
            ctx.moves.timeout_ms,
            ctx.moves.speed,
            ctx.moves.ramp_ms,
            ctx.now_ms,
        );
    }

    fn monitor_move(&mut self, ctx: &mut FsmContext<'_>) -> Option<FlagState> {
        if !self.move_started {
            log_error!("Motor did not start");
            return Some(FlagState::FaultRecovery);
        }

        if ctx.motor.is_running() {
            if ctx.motor.ordered_station() != self.move_target {
                log_decorated!(
                    "Order changed to {} during move; recalibrating",
                    ctx.motor.ordered_station()
                );
                ctx.motor.stop_motor(MoveStatus::Cancelled);
                return Some(FlagState::Calibration);
            }
            return None;
        }

        match ctx.motor.move_status() {
            MoveStatus::OnStation => {
                ctx.motor.confirm_arrival(self.move_target);
                Some(FlagState::OnStation)
            }
            MoveStatus::Cancelled => Some(FlagState::Calibration),
            _ => Some(FlagState::FaultRecovery),
        }
    }
}

/// Determine the actual station from the markers alone and choose the next
/// state. Both or neither marker present means the station is unknown.
fn calibrate(ctx: &mut FsmContext<'_>) -> FlagState {
    match (ctx.sensors.full, ctx.sensors.half) {
        (true, false) => ctx.motor.confirm_arrival(Station::Full),
        (false, true) => ctx.motor.confirm_arrival(Station::Half),
        (true, true) => {
            log_warning!("Both station markers present; station unknown");
            ctx.motor.invalidate_station();
        }
        (false, false) => ctx.motor.invalidate_station(),
    }

    if !ctx.motor.ordered_station().is_known() {
        ctx.motor.set_ordered_station(Station::Full);
    }

    let actual = ctx.motor.recorded_station();
    log_decorated!(
        "Calibrated: actual {actual}, ordered {}",
        ctx.motor.ordered_station()
    );
    if actual == ctx.motor.ordered_station() {
        FlagState::OnStation
    } else {
        FlagState::MovingToStation
    }
}
