//! Flag event scheduling.
//!
//! The [`Scheduler`] owns the installation settings, the event store and the
//! persisted record. Hosts drive it through two JSON commands (configure and
//! submit-event) and a handful of queries; the control loop reads the ordered
//! station and re-resolves whenever the wake deadline passes.
//!
//! ## Module Structure
//!
//! - [`settings`]: installation settings and the configure-command surface
//! - [`time_mark`]: compact time-mark grammar, including sun-relative marks
//! - [`event`]: flag events and the submit-event surface
//! - [`matching`]: jurisdiction and flag applicability rules
//! - [`store`]: fixed-capacity event slots with insert/update/delete/purge
//! - [`resolver`]: overlapping windows to one ordered station and wake time
//! - [`persist`]: versioned durable record and its diagnostic view
//! - [`errors`]: result codes and error types

pub mod errors;
pub mod event;
pub mod matching;
pub mod persist;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod time_mark;

pub use errors::{ResultCode, ScheduleError, TimeMarkError};
pub use event::FlagEvent;
pub use persist::StoredSchedule;
pub use resolver::{ResolvedSchedule, next_wake, resolve_schedule};
pub use settings::SchedulerConfig;
pub use store::{EventStore, Receipt};
pub use time_mark::{MarkDestination, parse_time_mark};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::station::Station;
use crate::storage::BlobStore;

/// Owns scheduling state and its persistence.
pub struct Scheduler {
    config: SchedulerConfig,
    events: EventStore,
    configured: bool,
    resolved: ResolvedSchedule,
    wake_at: Option<DateTime<Utc>>,
    attention: bool,
    put_count: u32,
    blob: Box<dyn BlobStore>,
}

impl Scheduler {
    /// Restore from `blob` and resolve against `now`.
    ///
    /// A missing, unreadable or differently versioned record leaves the
    /// scheduler unconfigured with an empty event list.
    pub fn begin(blob: Box<dyn BlobStore>, now: DateTime<Utc>) -> Self {
        let record = match blob.load() {
            Ok(Some(bytes)) => {
                let record = StoredSchedule::decode(&bytes);
                if record.is_none() {
                    log_warning!("Discarding persisted schedule with unexpected format or version");
                }
                record
            }
            Ok(None) => None,
            Err(e) => {
                log_error!("Failed to load persisted schedule: {e:#}");
                None
            }
        };

        let mut scheduler = Self {
            config: SchedulerConfig::default(),
            events: EventStore::new(),
            configured: false,
            resolved: ResolvedSchedule::default(),
            wake_at: None,
            attention: false,
            put_count: 0,
            blob,
        };

        if let Some(record) = record {
            scheduler.config = record.config();
            scheduler.events = record.store();
            scheduler.put_count = record.put_count;
            scheduler.configured = true;
            log_decorated!(
                "Restored schedule: {} event(s), write count {}",
                scheduler.events.len(),
                scheduler.put_count
            );
        }

        scheduler.refresh(now);
        scheduler
    }

    /// Apply a configure command. Always returns [`ResultCode::Success`]:
    /// malformed input is treated as an empty object, and the unit is marked
    /// configured, re-resolved and persisted either way.
    pub fn configure(&mut self, json: &str, now: DateTime<Utc>) -> i32 {
        let fields = match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) | Err(_) => {
                log_warning!("Ignoring malformed configuration: {json}");
                Map::new()
            }
        };

        let applied = self.config.apply_json(&fields);
        self.configured = true;

        log_block_start!("Scheduler configured");
        if !applied.is_empty() {
            log_indented!("Updated: {}", applied.join(", "));
        }

        self.refresh(now);
        ResultCode::Success.code()
    }

    /// Apply a submit-event command and return its result code.
    pub fn submit_event(&mut self, json: &str, now: DateTime<Utc>) -> i32 {
        match self.receive_event(json, now) {
            Ok(_) => ResultCode::Success.code(),
            Err(e) => e.result_code().code(),
        }
    }

    /// Typed form of [`Scheduler::submit_event`].
    pub fn receive_event(&mut self, json: &str, now: DateTime<Utc>) -> Result<Receipt, ScheduleError> {
        let incoming = FlagEvent::from_json(json, &self.config).inspect_err(|e| {
            log_warning!("{e}");
        })?;
        let id_version = incoming.id_version();

        let receipt = self
            .events
            .receive(incoming, &self.config, now)
            .inspect_err(|e| log_warning!("Event {id_version} rejected: {e}"))?;

        match receipt {
            Receipt::Stored(slot) => log_block_start!("Event {id_version} stored in slot {slot}"),
            Receipt::Updated(slot) => log_block_start!("Event {id_version} updated in slot {slot}"),
            Receipt::Deleted(slot) => log_block_start!("Event {id_version} deleted from slot {slot}"),
            Receipt::Stale => log_decorated!("Event {id_version} is not newer than stored; ignored"),
            Receipt::NothingToDelete => log_decorated!("Event {id_version} delete: no such event"),
        }

        if receipt.changed() {
            self.refresh(now);
        }
        Ok(receipt)
    }

    /// Re-resolve marks, applicability and the ordered station, re-arm the
    /// wake deadline and persist. Resolution is skipped while unconfigured.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.attention = false;

        if self.configured {
            let cleared = self.events.reprocess(&self.config);
            if cleared > 0 {
                log_decorated!("Cleared {cleared} event(s) whose time marks no longer resolve");
            }

            let previous = self.resolved;
            self.resolved = resolve_schedule(&mut self.events, now);
            let wake = next_wake(&self.resolved, &self.config, now);
            self.wake_at = Some(wake);

            if previous != self.resolved {
                log_block_start!("Schedule resolved: flag ordered {}", self.resolved.ordered);
                match self.resolved.next_change {
                    Some(change) => log_indented!(
                        "Next change: {} at {}",
                        self.resolved.next_station,
                        event::format_instant(change)
                    ),
                    None => log_indented!("No change scheduled"),
                }
            }
            log_debug!("Next schedule check at {}", event::format_instant(wake));
        } else {
            self.resolved = ResolvedSchedule::default();
            self.wake_at = None;
        }

        self.persist();
    }

    fn persist(&mut self) {
        self.put_count = self.put_count.wrapping_add(1);
        let record = StoredSchedule::capture(&self.config, &self.events, self.put_count);
        let result = record.encode().and_then(|bytes| self.blob.save(&bytes));
        if let Err(e) = result {
            log_error!("Failed to persist schedule: {e:#}");
        }
    }

    /// Flag the scheduler for re-resolution on the next housekeeping pass.
    pub fn request_attention(&mut self) {
        self.attention = true;
    }

    /// Whether the control loop should call [`Scheduler::refresh`].
    pub fn needs_attention(&self, now: DateTime<Utc>) -> bool {
        self.attention || self.wake_at.is_some_and(|wake| now >= wake)
    }

    /// Milliseconds until the wake deadline; 0 when due or not armed.
    pub fn ms_until_next(&self, now: DateTime<Utc>) -> u64 {
        self.wake_at
            .map(|wake| (wake - now).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    pub fn wake_at(&self) -> Option<DateTime<Utc>> {
        self.wake_at
    }

    pub fn ordered_station(&self) -> Station {
        self.resolved.ordered
    }

    pub fn resolved(&self) -> ResolvedSchedule {
        self.resolved
    }

    pub fn next_flag_change(&self) -> Option<DateTime<Utc>> {
        self.resolved.next_change
    }

    pub fn next_flag_station(&self) -> Station {
        self.resolved.next_station
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    pub fn put_count(&self) -> u32 {
        self.put_count
    }

    /// Valid events that apply to this installation.
    pub fn active_event_count(&self) -> usize {
        self.events.active_count()
    }

    /// Id of the first applicable event in effect at `now`.
    pub fn first_active_event(&self, now: DateTime<Utc>) -> Option<u32> {
        self.events.first_active(now)
    }

    /// Configure-command JSON of the current settings.
    pub fn show_config(&self) -> String {
        self.config.to_json_string()
    }

    /// `{"EVL":[...]}` with `"<id>.<version>"` or `null` per slot.
    pub fn show_event_list(&self) -> String {
        serde_json::json!({ "EVL": self.events.id_versions() }).to_string()
    }

    /// Show-event JSON for one slot, `None` when the slot is empty.
    pub fn show_event(&self, index: usize) -> Option<String> {
        self.events.get(index).map(FlagEvent::to_json_string)
    }

    /// Diagnostic view of the record as currently persisted.
    pub fn show_persisted(&self) -> Option<String> {
        match self.blob.load() {
            Ok(Some(bytes)) => StoredSchedule::decode(&bytes).map(|r| r.to_diagnostic_json()),
            Ok(None) => None,
            Err(e) => {
                log_error!("Failed to read persisted schedule: {e:#}");
                None
            }
        }
    }

    /// One-line summary of where the flag belongs and what happens next.
    pub fn show_next(&self, now: DateTime<Utc>) -> String {
        if !self.configured {
            return "Unconfigured: flag held at FULL".to_string();
        }
        let current = match self.first_active_event(now) {
            Some(id) => format!("{} (event {id})", self.resolved.ordered),
            None => self.resolved.ordered.to_string(),
        };
        match self.resolved.next_change {
            Some(change) => format!(
                "{current} until {}, then {}",
                event::format_instant(change),
                self.resolved.next_station
            ),
            None => format!("{current}, no change scheduled"),
        }
    }
}
