//! Durable record of the scheduler configuration and event list.
//!
//! The record is tagged with a segment type and version. Any mismatch on load
//! discards the record instead of misreading it, and the write counter
//! restarts. Strings are cut to the fixed field widths of the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{FlagEvent, format_instant};
use super::settings::{SchedulerConfig, round_to, truncate};
use super::store::EventStore;
use crate::common::constants::{
    EVENT_CAPACITY, STORE_FLAG_WIDTH, STORE_JURISDICTION_WIDTH, STORE_MARK_WIDTH,
    STORE_POSTAL_WIDTH, STORE_SEGMENT_TYPE, STORE_SEGMENT_VERSION,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: u32,
    pub version: u32,
    /// Unix seconds; 0 when unset.
    pub begin: i64,
    pub end: i64,
    pub jurisdiction: String,
    pub flag_code: String,
    pub begin_mark: String,
    pub end_mark: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSchedule {
    pub segment_type: char,
    pub segment_version: u8,
    pub put_count: u32,
    pub top_flag: String,
    pub top_flag_priority: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub federal_jurisdiction: String,
    pub state_jurisdiction: String,
    pub postal_code: String,
    pub utc_offset_hours: f64,
    pub dst: bool,
    pub events: Vec<Option<StoredEvent>>,
}

fn to_unix(instant: Option<DateTime<Utc>>) -> i64 {
    instant.map_or(0, |t| t.timestamp())
}

fn from_unix(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds == 0 {
        None
    } else {
        DateTime::from_timestamp(seconds, 0)
    }
}

impl StoredSchedule {
    /// Snapshot `config` and the valid events of `store`.
    pub fn capture(config: &SchedulerConfig, store: &EventStore, put_count: u32) -> Self {
        let events = store
            .slots()
            .iter()
            .map(|slot| {
                slot.as_ref().filter(|event| event.valid).map(|event| StoredEvent {
                    id: event.id,
                    version: event.version,
                    begin: to_unix(event.begin),
                    end: to_unix(event.end),
                    jurisdiction: truncate(&event.jurisdiction, STORE_JURISDICTION_WIDTH),
                    flag_code: truncate(&event.flag_code, STORE_FLAG_WIDTH),
                    begin_mark: truncate(&event.begin_mark, STORE_MARK_WIDTH),
                    end_mark: truncate(&event.end_mark, STORE_MARK_WIDTH),
                })
            })
            .collect();

        Self {
            segment_type: STORE_SEGMENT_TYPE,
            segment_version: STORE_SEGMENT_VERSION,
            put_count,
            top_flag: truncate(&config.top_flag, STORE_FLAG_WIDTH),
            top_flag_priority: config.top_flag_priority,
            latitude: config.latitude,
            longitude: config.longitude,
            federal_jurisdiction: truncate(&config.federal_jurisdiction, STORE_JURISDICTION_WIDTH),
            state_jurisdiction: truncate(&config.state_jurisdiction, STORE_JURISDICTION_WIDTH),
            postal_code: truncate(&config.postal_code, STORE_POSTAL_WIDTH),
            utc_offset_hours: config.utc_offset_hours,
            dst: config.dst,
            events,
        }
    }

    /// Decode a record, returning `None` for unreadable bytes or a different
    /// segment type or version.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let record: StoredSchedule = serde_json::from_slice(bytes).ok()?;
        (record.segment_type == STORE_SEGMENT_TYPE && record.segment_version == STORE_SEGMENT_VERSION)
            .then_some(record)
    }

    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn config(&self) -> SchedulerConfig {
        SchedulerConfig {
            latitude: self.latitude,
            longitude: self.longitude,
            utc_offset_hours: self.utc_offset_hours,
            dst: self.dst,
            postal_code: self.postal_code.clone(),
            federal_jurisdiction: self.federal_jurisdiction.clone(),
            state_jurisdiction: self.state_jurisdiction.clone(),
            top_flag_priority: self.top_flag_priority,
            top_flag: self.top_flag.clone(),
        }
    }

    /// Rebuild the event store. Records with a positive id are valid; the
    /// stored instants are kept until the next reprocess re-resolves them.
    pub fn store(&self) -> EventStore {
        let mut store = EventStore::new();
        for (index, record) in self.events.iter().take(EVENT_CAPACITY).enumerate() {
            let Some(record) = record.as_ref().filter(|r| r.id > 0) else {
                continue;
            };
            let mut event = FlagEvent::new(record.id, record.version);
            event.begin = from_unix(record.begin);
            event.end = from_unix(record.end);
            event.jurisdiction = record.jurisdiction.clone();
            event.flag_code = record.flag_code.clone();
            event.begin_mark = record.begin_mark.clone();
            event.end_mark = record.end_mark.clone();
            store.restore(index, event);
        }
        store
    }

    /// Diagnostic view with the short keys used on the device dashboard.
    pub fn to_diagnostic_json(&self) -> String {
        let view = DiagnosticView {
            segment_type: self.segment_type.to_string(),
            segment_version: self.segment_version,
            put_count: self.put_count,
            top_flag: &self.top_flag,
            top_flag_priority: self.top_flag_priority,
            latitude: round_to(self.latitude, 6),
            longitude: round_to(self.longitude, 6),
            federal_jurisdiction: &self.federal_jurisdiction,
            state_jurisdiction: &self.state_jurisdiction,
            postal_code: &self.postal_code,
            utc_offset_hours: self.utc_offset_hours,
            dst: self.dst,
            events: self
                .events
                .iter()
                .map(|slot| {
                    slot.as_ref().filter(|r| r.id > 0).map(|r| DiagnosticEvent {
                        id: r.id,
                        version: r.version,
                        begin: from_unix(r.begin).map(format_instant).unwrap_or_default(),
                        end: from_unix(r.end).map(format_instant).unwrap_or_default(),
                        jurisdiction: &r.jurisdiction,
                        flag_code: &r.flag_code,
                        begin_mark: &r.begin_mark,
                        end_mark: &r.end_mark,
                    })
                })
                .collect(),
        };
        serde_json::to_string(&view).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Serialize)]
struct DiagnosticView<'a> {
    #[serde(rename = "STYP")]
    segment_type: String,
    #[serde(rename = "SVER")]
    segment_version: u8,
    #[serde(rename = "PUTS")]
    put_count: u32,
    #[serde(rename = "FLAG")]
    top_flag: &'a str,
    #[serde(rename = "FPRI")]
    top_flag_priority: i64,
    #[serde(rename = "SLAT")]
    latitude: f64,
    #[serde(rename = "SLNG")]
    longitude: f64,
    #[serde(rename = "JFED")]
    federal_jurisdiction: &'a str,
    #[serde(rename = "JSTA")]
    state_jurisdiction: &'a str,
    #[serde(rename = "POST")]
    postal_code: &'a str,
    #[serde(rename = "TZOF")]
    utc_offset_hours: f64,
    #[serde(rename = "DDST")]
    dst: bool,
    #[serde(rename = "EVLS")]
    events: Vec<Option<DiagnosticEvent<'a>>>,
}

#[derive(Serialize)]
struct DiagnosticEvent<'a> {
    #[serde(rename = "ID")]
    id: u32,
    #[serde(rename = "VR")]
    version: u32,
    #[serde(rename = "GB")]
    begin: String,
    #[serde(rename = "GE")]
    end: String,
    #[serde(rename = "EJ")]
    jurisdiction: &'a str,
    #[serde(rename = "EF")]
    flag_code: &'a str,
    #[serde(rename = "BM")]
    begin_mark: &'a str,
    #[serde(rename = "EM")]
    end_mark: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> (SchedulerConfig, EventStore) {
        let config = SchedulerConfig {
            latitude: 36.5484,
            longitude: -82.5618,
            utc_offset_hours: -5.0,
            dst: true,
            postal_code: "376601234".into(),
            federal_jurisdiction: "US".into(),
            state_jurisdiction: "US-TN".into(),
            top_flag_priority: 2,
            top_flag: "TNX".into(),
        };
        let mut store = EventStore::new();
        let mut event = FlagEvent::new(12, 3);
        event.jurisdiction = "US-TN-SULLIVAN".into();
        event.flag_code = "US".into();
        event.begin_mark = "2025-07-04 13:00Z".into();
        event.begin = Some(Utc.with_ymd_and_hms(2025, 7, 4, 13, 0, 0).unwrap());
        store.restore(4, event);
        (config, store)
    }

    #[test]
    fn test_capture_truncates_fields() {
        let (config, store) = sample();
        let record = StoredSchedule::capture(&config, &store, 7);

        assert_eq!(record.top_flag, "TN");
        assert_eq!(record.postal_code, "37660");
        assert_eq!(record.events.len(), EVENT_CAPACITY);
        let stored = record.events[4].as_ref().unwrap();
        assert_eq!(stored.jurisdiction, "US-TN-SUL");
        assert_eq!(stored.end, 0);
    }

    #[test]
    fn test_decode_rejects_other_segments() {
        let (config, store) = sample();
        let mut record = StoredSchedule::capture(&config, &store, 1);
        let bytes = record.encode().unwrap();
        assert_eq!(StoredSchedule::decode(&bytes), Some(record.clone()));

        record.segment_version = STORE_SEGMENT_VERSION + 1;
        assert_eq!(StoredSchedule::decode(&record.encode().unwrap()), None);

        record.segment_version = STORE_SEGMENT_VERSION;
        record.segment_type = 'G';
        assert_eq!(StoredSchedule::decode(&record.encode().unwrap()), None);

        assert_eq!(StoredSchedule::decode(b"\x00\x01garbage"), None);
    }

    #[test]
    fn test_restore_keeps_slots_and_instants() {
        let (config, store) = sample();
        let record = StoredSchedule::capture(&config, &store, 1);
        let restored = record.store();

        let event = restored.get(4).unwrap();
        assert_eq!(event.id, 12);
        assert!(event.valid);
        assert_eq!(event.begin, Some(Utc.with_ymd_and_hms(2025, 7, 4, 13, 0, 0).unwrap()));
        assert_eq!(event.end, None);
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn test_diagnostic_json_keys() {
        let (config, store) = sample();
        let text = StoredSchedule::capture(&config, &store, 9).to_diagnostic_json();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["STYP"], "S");
        assert_eq!(value["SVER"], 1);
        assert_eq!(value["PUTS"], 9);
        assert_eq!(value["JSTA"], "US-TN");
        assert!(value["EVLS"][0].is_null());
        assert_eq!(value["EVLS"][4]["ID"], 12);
        assert_eq!(value["EVLS"][4]["GB"], "2025-07-04 13:00:00Z");
        assert_eq!(value["EVLS"][4]["GE"], "");
        assert!(text.starts_with(r#"{"STYP":"S","SVER":1,"PUTS":9,"FLAG":"TN""#));
    }
}
