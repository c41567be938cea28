//! Default configuration file creation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;

/// Write a commented default `smartflag.toml` to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    fs::write(path, default_config_content())
        .with_context(|| format!("Failed to write default config to {}", path.display()))
}

pub(crate) fn default_config_content() -> String {
    let content = ConfigBuilder::new()
        .add_section("Motor")
        .add_setting(
            "stall_amps",
            &format!("{DEFAULT_STALL_AMPS:.1}"),
            &format!(
                "Motor current that ends a move as a stall ({MINIMUM_STALL_AMPS}-{MAXIMUM_STALL_AMPS}) amps"
            ),
        )
        .add_setting(
            "current_scale",
            &format!("{DEFAULT_CURRENT_SCALE:.1}"),
            "Current-sense gain in amps per volt",
        )
        .add_setting(
            "adc_reference_volts",
            &format!("{DEFAULT_ADC_REFERENCE_VOLTS:.1}"),
            "ADC reference voltage",
        )
        .add_setting(
            "adc_max_count",
            &DEFAULT_ADC_MAX_COUNT.to_string(),
            "ADC full-scale count",
        )
        .add_section("Moves")
        .add_setting(
            "ramp_floor_ms",
            &DEFAULT_RAMP_FLOOR_MS.to_string(),
            &format!("Shortest allowed ramp ({MINIMUM_RAMP_FLOOR_MS}-{MAXIMUM_RAMP_FLOOR_MS}) ms"),
        )
        .add_setting(
            "move_ramp_ms",
            &DEFAULT_MOVE_RAMP_MS.to_string(),
            "Ramp used for station moves in ms",
        )
        .add_setting(
            "move_timeout_ms",
            &DEFAULT_MOVE_TIMEOUT_MS.to_string(),
            &format!("Station move time limit in ms (max {MAXIMUM_MOVE_TIMEOUT_MS} | 0 = none)"),
        )
        .add_setting(
            "move_speed",
            &DEFAULT_MOVE_SPEED.to_string(),
            "Target PWM duty for station moves (1-255)",
        )
        .add_section("Loop")
        .add_setting(
            "tick_interval_ms",
            &DEFAULT_TICK_INTERVAL_MS.to_string(),
            &format!(
                "Control cycle period ({MINIMUM_TICK_INTERVAL_MS}-{MAXIMUM_TICK_INTERVAL_MS}) ms"
            ),
        )
        .add_setting(
            "fault_dwell_ms",
            &DEFAULT_FAULT_DWELL_MS.to_string(),
            &format!(
                "Wait before retrying after a stall or timeout ({MINIMUM_FAULT_DWELL_MS}-{MAXIMUM_FAULT_DWELL_MS}) ms"
            ),
        )
        .add_section("Storage")
        .add_setting(
            "#state_file",
            "\"/var/lib/smartflag/schedule.json\"",
            "Persisted schedule location (default: $XDG_STATE_HOME/smartflag)",
        )
        .build();

    format!("{content}\n")
}

/// Builder for config files with aligned trailing comments.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // Longest setting line plus one space
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.chars().count()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry {
                ConfigEntry::Section(title) => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(title);
                    first_section = false;
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.chars().count());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        result.join("\n")
    }
}
