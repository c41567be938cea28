//! Host configuration for the controller.
//!
//! Hardware calibration and loop timing live in `smartflag.toml`. Scheduling
//! settings (location, jurisdictions, flags) are not here: they arrive as
//! configure commands and persist with the event list.
//!
//! ## Configuration Source
//!
//! `$XDG_CONFIG_HOME/smartflag/smartflag.toml`, or `<dir>/smartflag.toml` when
//! `--config <dir>` is given. A commented default file is written on first
//! load.
//!
//! ```toml
//! #[Motor]
//! stall_amps = 1.8          # Motor current that ends a move as a stall (0.1-10) amps
//! current_scale = 2.0       # Current-sense gain in amps per volt
//! adc_reference_volts = 3.3 # ADC reference voltage
//! adc_max_count = 4095      # ADC full-scale count
//!
//! #[Moves]
//! ramp_floor_ms = 500       # Shortest allowed ramp (50-5000) ms
//! move_ramp_ms = 1000       # Ramp used for station moves in ms
//! move_timeout_ms = 120000  # Station move time limit in ms (0 = none)
//! move_speed = 255          # Target PWM duty for station moves (1-255)
//!
//! #[Loop]
//! tick_interval_ms = 20     # Control cycle period (1-1000) ms
//! fault_dwell_ms = 30000    # Wait before retrying after a stall or timeout (1000-3600000) ms
//!
//! #[Storage]
//! #state_file = "/var/lib/smartflag/schedule.json" # Persisted schedule location
//! ```
//!
//! Every field is optional; missing fields take the `DEFAULT_*` constants.

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::common::constants::*;
use crate::control::LoopSettings;
use crate::fsm::MoveSettings;
use crate::motor::MotorTuning;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};
pub use validation::validate_config;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Current at or above which a move ends as a stall, in amps.
    pub stall_amps: Option<f32>,
    /// Current-sense gain in amps per volt.
    pub current_scale: Option<f32>,
    pub adc_reference_volts: Option<f32>,
    pub adc_max_count: Option<u16>,
    /// Minimum ramp length applied to every move.
    pub ramp_floor_ms: Option<u32>,
    pub move_ramp_ms: Option<u32>,
    /// Absolute limit for station moves; 0 disables it.
    pub move_timeout_ms: Option<u32>,
    pub move_speed: Option<u8>,
    pub tick_interval_ms: Option<u32>,
    pub fault_dwell_ms: Option<u32>,
    /// Override for the persisted schedule location.
    pub state_file: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        loading::load()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        loading::load_from_path(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        loading::get_config_path()
    }

    pub fn motor_tuning(&self) -> MotorTuning {
        MotorTuning {
            stall_amps: self.stall_amps.unwrap_or(DEFAULT_STALL_AMPS),
            current_scale: self.current_scale.unwrap_or(DEFAULT_CURRENT_SCALE),
            adc_reference_volts: self.adc_reference_volts.unwrap_or(DEFAULT_ADC_REFERENCE_VOLTS),
            adc_max_count: self.adc_max_count.unwrap_or(DEFAULT_ADC_MAX_COUNT),
            ramp_floor_ms: self.ramp_floor_ms.unwrap_or(DEFAULT_RAMP_FLOOR_MS),
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            tick_interval_ms: self.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS),
            moves: MoveSettings {
                ramp_ms: self.move_ramp_ms.unwrap_or(DEFAULT_MOVE_RAMP_MS),
                timeout_ms: self.move_timeout_ms.unwrap_or(DEFAULT_MOVE_TIMEOUT_MS),
                speed: self.move_speed.unwrap_or(DEFAULT_MOVE_SPEED),
                fault_dwell_ms: self.fault_dwell_ms.unwrap_or(DEFAULT_FAULT_DWELL_MS),
            },
        }
    }

    /// Where the scheduler record lives: `state_file` if set, otherwise
    /// `$XDG_STATE_HOME/smartflag/schedule.json` (`~/.local/state` fallback).
    pub fn state_file_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.state_file {
            return Ok(PathBuf::from(path));
        }
        let state_dir = match dirs::state_dir() {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not determine home directory for state file")?
                .join(".local")
                .join("state"),
        };
        Ok(state_dir.join(CONFIG_DIR_NAME).join(STORE_FILE_NAME))
    }

    pub fn log_config(&self) {
        let tuning = self.motor_tuning();
        let settings = self.loop_settings();

        log_block_start!("Loaded configuration");
        log_indented!("Stall threshold: {:.2} A", tuning.stall_amps);
        log_indented!(
            "Current sense: {} A/V, {} V over {} counts",
            tuning.current_scale,
            tuning.adc_reference_volts,
            tuning.adc_max_count
        );
        log_indented!(
            "Moves: speed {}, ramp {} ms (floor {} ms), timeout {}",
            settings.moves.speed,
            settings.moves.ramp_ms,
            tuning.ramp_floor_ms,
            match settings.moves.timeout_ms {
                0 => "none".to_string(),
                ms => format!("{ms} ms"),
            }
        );
        log_indented!(
            "Tick: {} ms, fault dwell: {} ms",
            settings.tick_interval_ms,
            settings.moves.fault_dwell_ms
        );
    }
}
