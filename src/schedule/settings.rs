//! Installation settings that decide which events apply and where the sun is.

use chrono::Duration;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::common::constants::{
    MAXIMUM_UTC_OFFSET_HOURS, STORE_FLAG_WIDTH, STORE_JURISDICTION_WIDTH, STORE_POSTAL_WIDTH,
};

/// Location, time zone and jurisdiction of this flagpole.
///
/// Changed only through [`SchedulerConfig::apply_json`]; any change requires
/// every stored event to be re-resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Standard-time offset from UTC in hours (negative west of Greenwich).
    pub utc_offset_hours: f64,
    pub dst: bool,
    pub postal_code: String,
    pub federal_jurisdiction: String,
    pub state_jurisdiction: String,
    /// 1 = federal, 2 = state/region, 3 = other.
    pub top_flag_priority: i64,
    /// Code of the topmost flag on this halyard.
    pub top_flag: String,
}

/// Output view preserving the command surface's key order.
#[derive(Serialize)]
struct ConfigView<'a> {
    #[serde(rename = "LAT")]
    latitude: f64,
    #[serde(rename = "LNG")]
    longitude: f64,
    #[serde(rename = "STD")]
    utc_offset_hours: f64,
    #[serde(rename = "DST")]
    dst: bool,
    #[serde(rename = "ZIP")]
    postal_code: &'a str,
    #[serde(rename = "FED")]
    federal_jurisdiction: &'a str,
    #[serde(rename = "STA")]
    state_jurisdiction: &'a str,
    #[serde(rename = "FPR")]
    top_flag_priority: i64,
    #[serde(rename = "FLG")]
    top_flag: &'a str,
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Read a JSON value as text; numbers and booleans are rendered.
pub(crate) fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Keep the first `width` characters, the width the durable record holds.
pub(crate) fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn value_as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

impl SchedulerConfig {
    /// Apply a configure-command object. Keys are matched case-insensitively;
    /// unknown keys and values of the wrong type are skipped.
    ///
    /// Returns the upper-cased keys that were applied.
    pub fn apply_json(&mut self, fields: &Map<String, Value>) -> Vec<String> {
        let mut applied = Vec::new();

        for (name, value) in fields {
            let key = name.to_ascii_uppercase();
            let ok = match key.as_str() {
                "LAT" => value_as_f64(value).map(|v| self.latitude = v).is_some(),
                "LNG" => value_as_f64(value).map(|v| self.longitude = v).is_some(),
                "STD" => value_as_f64(value)
                    .filter(|v| v.abs() <= MAXIMUM_UTC_OFFSET_HOURS)
                    .map(|v| self.utc_offset_hours = v)
                    .is_some(),
                "DST" => {
                    self.dst = value_as_bool(value);
                    true
                }
                "ZIP" => {
                    self.postal_code = truncate(&value_as_string(value), STORE_POSTAL_WIDTH);
                    true
                }
                "FED" => {
                    self.federal_jurisdiction = truncate(&value_as_string(value), STORE_JURISDICTION_WIDTH);
                    true
                }
                "STA" => {
                    self.state_jurisdiction = truncate(&value_as_string(value), STORE_JURISDICTION_WIDTH);
                    true
                }
                "FPR" => value_as_f64(value)
                    .map(|v| self.top_flag_priority = v as i64)
                    .is_some(),
                "FLG" => {
                    self.top_flag = truncate(&value_as_string(value), STORE_FLAG_WIDTH);
                    true
                }
                _ => false,
            };
            if ok {
                applied.push(key);
            }
        }

        applied
    }

    /// How far local clock time is ahead of UTC, DST included.
    ///
    /// `None` when the offset is not a representable duration.
    pub fn local_offset(&self) -> Option<Duration> {
        let dst_hours = if self.dst { 1.0 } else { 0.0 };
        let seconds = ((self.utc_offset_hours + dst_hours) * 3600.0).round();
        if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 {
            return None;
        }
        Duration::try_seconds(seconds as i64)
    }

    /// Render as the configure-command JSON object, keys in command order.
    pub fn to_json_string(&self) -> String {
        let view = ConfigView {
            latitude: round_to(self.latitude, 6),
            longitude: round_to(self.longitude, 6),
            utc_offset_hours: round_to(self.utc_offset_hours, 1),
            dst: self.dst,
            postal_code: &self.postal_code,
            federal_jurisdiction: &self.federal_jurisdiction,
            state_jurisdiction: &self.state_jurisdiction,
            top_flag_priority: self.top_flag_priority,
            top_flag: &self.top_flag,
        };
        serde_json::to_string(&view).unwrap_or_else(|_| "{}".to_string())
    }
}
