//! Flag events and their JSON submission format.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::errors::{ScheduleError, TimeMarkError};
use super::settings::{SchedulerConfig, truncate, value_as_bool, value_as_string};
use super::time_mark::{MarkDestination, parse_time_mark};
use crate::common::constants::{STORE_FLAG_WIDTH, STORE_JURISDICTION_WIDTH};

/// A published request to place flags at half-staff for a window of time.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagEvent {
    /// Always positive for a stored event.
    pub id: u32,
    pub version: u32,
    /// Parsed without error. Invalid events are purged.
    pub valid: bool,
    /// Jurisdiction and flag match this installation.
    pub applies: bool,
    pub is_delete: bool,
    pub jurisdiction: String,
    pub flag_code: String,
    /// Original begin mark text; empty when none was given.
    pub begin_mark: String,
    pub end_mark: String,
    pub begin: Option<DateTime<Utc>>,
    /// `None` is unbounded.
    pub end: Option<DateTime<Utc>>,
}

impl FlagEvent {
    /// An event with identity only, as produced before any fields are parsed.
    pub fn new(id: u32, version: u32) -> Self {
        Self {
            id,
            version,
            valid: true,
            applies: false,
            is_delete: false,
            jurisdiction: String::new(),
            flag_code: String::new(),
            begin_mark: String::new(),
            end_mark: String::new(),
            begin: None,
            end: None,
        }
    }

    /// Parse a submit-event JSON object. Keys are case-insensitive.
    ///
    /// Begin marks resolve toward half-staff (sunrise by default), end marks
    /// toward full (sunset by default).
    pub fn from_json(text: &str, config: &SchedulerConfig) -> Result<Self, ScheduleError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ScheduleError::Parse(format!("invalid JSON: {e}")))?;
        let fields = value
            .as_object()
            .ok_or_else(|| ScheduleError::Parse("event must be a JSON object".into()))?;

        let mut event = FlagEvent::new(0, 0);

        for (name, value) in fields {
            match name.to_ascii_uppercase().as_str() {
                "IDV" => {
                    let (id, version) = parse_id_version(&value_as_string(value))?;
                    event.id = id;
                    event.version = version;
                }
                "JUR" => {
                    event.jurisdiction = truncate(&value_as_string(value), STORE_JURISDICTION_WIDTH);
                }
                "FLG" => event.flag_code = truncate(&value_as_string(value), STORE_FLAG_WIDTH),
                "BMK" => {
                    event.begin_mark = value_as_string(value);
                    event.begin = parse_mark(&event.begin_mark, MarkDestination::Half, config)?;
                }
                "EMK" => {
                    event.end_mark = value_as_string(value);
                    event.end = parse_mark(&event.end_mark, MarkDestination::Full, config)?;
                }
                "DEL" => event.is_delete = value_as_bool(value),
                _ => {}
            }
        }

        if event.id == 0 {
            return Err(ScheduleError::Parse("missing IDV".into()));
        }
        Ok(event)
    }

    /// Re-resolve both marks under `config`.
    pub fn resolve_marks(&mut self, config: &SchedulerConfig) -> Result<(), TimeMarkError> {
        self.begin = parse_mark(&self.begin_mark, MarkDestination::Half, config)?;
        self.end = parse_mark(&self.end_mark, MarkDestination::Full, config)?;
        Ok(())
    }

    /// `"<id>.<version>"`
    pub fn id_version(&self) -> String {
        format!("{}.{}", self.id, self.version)
    }

    /// Begin has passed and the end has not (an unbounded end never passes).
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        match self.begin {
            Some(begin) if begin <= now => self.end.is_none_or(|end| end > now),
            _ => false,
        }
    }

    /// Show-event JSON: `APP`, `VLD`, `IDV`, `BMK`, `JUR`, `FLG`, `EMK`.
    pub fn to_json_string(&self) -> String {
        let view = EventView {
            applies: self.applies,
            valid: self.valid,
            id_version: self.id_version(),
            begin: self.begin.map(format_instant),
            jurisdiction: &self.jurisdiction,
            flag_code: &self.flag_code,
            end: self.end.map(format_instant),
        };
        serde_json::to_string(&view).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Serialize)]
struct EventView<'a> {
    #[serde(rename = "APP")]
    applies: bool,
    #[serde(rename = "VLD")]
    valid: bool,
    #[serde(rename = "IDV")]
    id_version: String,
    #[serde(rename = "BMK")]
    begin: Option<String>,
    #[serde(rename = "JUR")]
    jurisdiction: &'a str,
    #[serde(rename = "FLG")]
    flag_code: &'a str,
    #[serde(rename = "EMK")]
    end: Option<String>,
}

pub(crate) fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%SZ").to_string()
}

fn parse_mark(
    mark: &str,
    destination: MarkDestination,
    config: &SchedulerConfig,
) -> Result<Option<DateTime<Utc>>, TimeMarkError> {
    if mark.is_empty() {
        return Ok(None);
    }
    parse_time_mark(mark, destination, config)
}

/// Split `"<id>.<version>"`. The id must be positive.
pub fn parse_id_version(text: &str) -> Result<(u32, u32), ScheduleError> {
    let bad = || ScheduleError::Parse(format!("IDV '{text}' must be <id>.<version>"));

    let (id, version) = text.trim().split_once('.').ok_or_else(bad)?;
    let id: u32 = id.parse().map_err(|_| bad())?;
    let version: u32 = version.parse().map_err(|_| bad())?;
    if id == 0 {
        return Err(bad());
    }
    Ok((id, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            latitude: 40.7128,
            longitude: -74.0060,
            utc_offset_hours: -5.0,
            dst: true,
            federal_jurisdiction: "US".into(),
            state_jurisdiction: "US-NY".into(),
            top_flag: "NY".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_full_event() {
        let event = FlagEvent::from_json(
            r#"{"IDV":"42.3","JUR":"US","FLG":"US","BMK":"2025-07-04 13:00Z","EMK":"TBD"}"#,
            &config(),
        )
        .unwrap();

        assert_eq!((event.id, event.version), (42, 3));
        assert!(event.valid);
        assert!(!event.is_delete);
        assert_eq!(event.jurisdiction, "US");
        assert_eq!(event.begin, Some(Utc.with_ymd_and_hms(2025, 7, 4, 13, 0, 0).unwrap()));
        assert_eq!(event.end, None);
        assert_eq!(event.end_mark, "TBD");
    }

    #[test]
    fn test_lowercase_keys_and_delete() {
        let event = FlagEvent::from_json(r#"{"idv":"7.1","del":true}"#, &config()).unwrap();
        assert!(event.is_delete);
        assert_eq!(event.begin, None);
    }

    #[test]
    fn test_rejects_bad_ids() {
        for json in [
            r#"{"IDV":"42"}"#,
            r#"{"IDV":"0.1"}"#,
            r#"{"IDV":"-3.1"}"#,
            r#"{"IDV":"x.1"}"#,
            r#"{"JUR":"US"}"#,
            r#"not json"#,
            r#"[1,2]"#,
        ] {
            assert!(
                matches!(FlagEvent::from_json(json, &config()), Err(ScheduleError::Parse(_))),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn test_bad_time_mark_rejects_event() {
        let result = FlagEvent::from_json(r#"{"IDV":"1.1","BMK":"2025-07-04 13:3"}"#, &config());
        assert!(matches!(result, Err(ScheduleError::Parse(_))));
    }

    #[test]
    fn test_codes_are_cut_to_record_widths() {
        let event = FlagEvent::from_json(
            r#"{"IDV":"3.1","JUR":"US-TN-SULLIVAN","FLG":"USA","BMK":"TBD","EMK":"TBD"}"#,
            &config(),
        )
        .unwrap();
        assert_eq!(event.jurisdiction, "US-TN-SUL");
        assert_eq!(event.flag_code, "US");
    }

    #[test]
    fn test_local_mark_with_absurd_offset_is_rejected() {
        let config = SchedulerConfig {
            utc_offset_hours: 1e12,
            ..config()
        };
        let result = FlagEvent::from_json(r#"{"IDV":"1.1","BMK":"2025-07-04 13:30L"}"#, &config);
        assert!(matches!(result, Err(ScheduleError::Parse(_))));
    }

    #[test]
    fn test_is_current_window() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut event = FlagEvent::new(1, 1);
        event.begin = Some(t0);
        event.end = Some(t0 + chrono::Duration::hours(1));

        assert!(!event.is_current(t0 - chrono::Duration::seconds(1)));
        assert!(event.is_current(t0));
        assert!(!event.is_current(t0 + chrono::Duration::hours(1)));

        event.end = None;
        assert!(event.is_current(t0 + chrono::Duration::days(400)));
    }

    #[test]
    fn test_show_json() {
        let mut event = FlagEvent::new(5, 2);
        event.jurisdiction = "US".into();
        event.flag_code = "US".into();
        event.begin = Some(Utc.with_ymd_and_hms(2025, 7, 4, 9, 30, 0).unwrap());

        let text = event.to_json_string();
        assert_eq!(
            text,
            r#"{"APP":false,"VLD":true,"IDV":"5.2","BMK":"2025-07-04 09:30:00Z","JUR":"US","FLG":"US","EMK":null}"#
        );
    }
}
