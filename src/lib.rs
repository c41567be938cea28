//! # smartflag
//!
//! Control core for an automated flagpole halyard.
//!
//! This library exists to enable testing of the controller internals and to
//! keep CLI dispatch (main.rs) separate from application logic.
//!
//! ## Architecture
//!
//! - **Scheduling**: `schedule` turns configured flag events, with solar time
//!   marks from `geo`, into an ordered station and a wake deadline
//! - **Motion**: `motor` runs ramped, current- and time-bounded moves
//! - **Sequencing**: `fsm` is the calibration/move/fault/lid state machine
//! - **Composition**: `control` runs one cycle of all of the above per tick
//! - **Seams**: `hardware` (motor, sensors, tones, simulated rig), `storage`
//!   (persisted blob), `time` (millisecond counter and UTC clock)
//! - **Infrastructure**: `config`, `args`, `signals`, logging in `common`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

pub mod args;
pub mod config;
pub mod control;
pub mod fsm;
pub mod geo;
pub mod hardware;
pub mod motor;
pub mod schedule;
pub mod signals;
pub mod station;
pub mod storage;
pub mod time;

#[cfg(feature = "testing-support")]
pub mod testing;
