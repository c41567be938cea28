//! Configuration validation.
//!
//! Rejects values that would make the drive unsafe or the loop unresponsive:
//! stall thresholds outside the sensing range, ramps too short to avoid an
//! inrush false-stall, and timeouts shorter than the ramp.

use anyhow::Result;

use super::Config;
use crate::common::constants::*;

pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(amps) = config.stall_amps
        && !(MINIMUM_STALL_AMPS..=MAXIMUM_STALL_AMPS).contains(&amps)
    {
        anyhow::bail!(
            "stall_amps ({amps} A) must be between {MINIMUM_STALL_AMPS} and {MAXIMUM_STALL_AMPS} amps"
        );
    }

    if let Some(scale) = config.current_scale
        && !(scale > 0.0 && scale.is_finite())
    {
        anyhow::bail!("current_scale ({scale}) must be a positive number of amps per volt");
    }

    if let Some(volts) = config.adc_reference_volts
        && !(volts > 0.0 && volts.is_finite())
    {
        anyhow::bail!("adc_reference_volts ({volts}) must be a positive voltage");
    }

    if config.adc_max_count == Some(0) {
        anyhow::bail!("adc_max_count must be greater than 0");
    }

    let ramp_floor = config.ramp_floor_ms.unwrap_or(DEFAULT_RAMP_FLOOR_MS);
    if !(MINIMUM_RAMP_FLOOR_MS..=MAXIMUM_RAMP_FLOOR_MS).contains(&ramp_floor) {
        anyhow::bail!(
            "ramp_floor_ms ({ramp_floor} ms) must be between {MINIMUM_RAMP_FLOOR_MS} and {MAXIMUM_RAMP_FLOOR_MS} milliseconds"
        );
    }

    if config.move_speed == Some(0) {
        anyhow::bail!("move_speed must be between 1 and 255");
    }

    // The effective ramp is never shorter than the floor.
    let ramp = config
        .move_ramp_ms
        .unwrap_or(DEFAULT_MOVE_RAMP_MS)
        .max(ramp_floor);
    let timeout = config.move_timeout_ms.unwrap_or(DEFAULT_MOVE_TIMEOUT_MS);
    if timeout > MAXIMUM_MOVE_TIMEOUT_MS {
        anyhow::bail!(
            "move_timeout_ms ({timeout} ms) must not exceed {MAXIMUM_MOVE_TIMEOUT_MS} milliseconds"
        );
    }
    if timeout != 0 && timeout < ramp {
        anyhow::bail!(
            "move_timeout_ms ({timeout} ms) must be at least the ramp time ({ramp} ms), or 0 for no limit"
        );
    }

    if let Some(tick) = config.tick_interval_ms
        && !(MINIMUM_TICK_INTERVAL_MS..=MAXIMUM_TICK_INTERVAL_MS).contains(&tick)
    {
        anyhow::bail!(
            "tick_interval_ms ({tick} ms) must be between {MINIMUM_TICK_INTERVAL_MS} and {MAXIMUM_TICK_INTERVAL_MS} milliseconds"
        );
    }

    if let Some(dwell) = config.fault_dwell_ms
        && !(MINIMUM_FAULT_DWELL_MS..=MAXIMUM_FAULT_DWELL_MS).contains(&dwell)
    {
        anyhow::bail!(
            "fault_dwell_ms ({dwell} ms) must be between {MINIMUM_FAULT_DWELL_MS} and {MAXIMUM_FAULT_DWELL_MS} milliseconds"
        );
    }

    if let Some(path) = &config.state_file
        && path.trim().is_empty()
    {
        anyhow::bail!("state_file must not be empty when set");
    }

    Ok(())
}
