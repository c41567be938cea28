//! Test helpers shared by the integration suites.
//!
//! Enabled by the `testing-support` feature.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use crate::common::logger::Log;
use crate::control::{ControlLoop, LoopSettings};
use crate::fsm::{FlagState, Transition};
use crate::hardware::LoggingAnnunciator;
use crate::hardware::sim::SimRig;
use crate::motor::{MotorController, MotorTuning};
use crate::schedule::Scheduler;
use crate::station::Station;
use crate::storage::MemoryBlobStore;
use crate::time::{Clock, SimulatedClock};

/// UTC instant from calendar fields.
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid test instant {year}-{month}-{day} {hour}:{minute}"))
}

/// Builds submit-event JSON.
#[derive(Debug, Clone)]
pub struct EventJson {
    fields: Map<String, Value>,
}

impl EventJson {
    pub fn new(id: u32, version: u32) -> Self {
        let mut fields = Map::new();
        fields.insert("IDV".into(), json!(format!("{id}.{version}")));
        Self { fields }
    }

    /// A federal US event: `JUR` "US", `FLG` "US".
    pub fn federal(id: u32, version: u32) -> Self {
        Self::new(id, version).jurisdiction("US").flag("US")
    }

    pub fn jurisdiction(self, jurisdiction: &str) -> Self {
        self.with("JUR", json!(jurisdiction))
    }

    pub fn flag(self, flag: &str) -> Self {
        self.with("FLG", json!(flag))
    }

    pub fn begin(self, mark: &str) -> Self {
        self.with("BMK", json!(mark))
    }

    pub fn end(self, mark: &str) -> Self {
        self.with("EMK", json!(mark))
    }

    pub fn delete(self) -> Self {
        self.with("DEL", json!(true))
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn build(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

/// Configure JSON for an installation in New York, subscribed to US and NY.
pub fn new_york_config() -> String {
    json!({
        "LAT": 40.7128,
        "LNG": -74.0060,
        "STD": -5.0,
        "DST": true,
        "ZIP": "10001",
        "FED": "US",
        "STA": "US-NY",
        "FPR": 1,
        "FLG": "NY"
    })
    .to_string()
}

/// A control loop over a simulated rig, clock and in-memory store.
pub struct TestRig {
    pub clock: Arc<SimulatedClock>,
    pub rig: SimRig,
    pub blob: MemoryBlobStore,
    pub tones: LoggingAnnunciator,
    pub control: ControlLoop,
    tick: StdDuration,
}

impl TestRig {
    pub fn new(start: DateTime<Utc>, station: Station) -> Self {
        Self::build(start, station, MemoryBlobStore::new(), LoopSettings::default())
    }

    pub fn build(
        start: DateTime<Utc>,
        station: Station,
        blob: MemoryBlobStore,
        settings: LoopSettings,
    ) -> Self {
        Log::set_enabled(false);

        let clock = Arc::new(SimulatedClock::new(start));
        let shared: Arc<dyn Clock> = clock.clone();
        let rig = SimRig::at_station(shared.clone(), station);
        let tones = LoggingAnnunciator::new();

        let scheduler = Scheduler::begin(Box::new(blob.clone()), start);
        let motor = MotorController::new(Box::new(rig.motor()), MotorTuning::default());
        let control = ControlLoop::new(
            scheduler,
            motor,
            Box::new(rig.sensors()),
            Box::new(tones.clone()),
            shared,
            settings,
        );

        Self {
            clock,
            rig,
            blob,
            tones,
            control,
            tick: StdDuration::from_millis(u64::from(settings.tick_interval_ms)),
        }
    }

    /// One control cycle followed by one tick of simulated time.
    pub fn step(&mut self) -> Option<Transition> {
        let transition = self.control.tick();
        self.clock.sleep(self.tick);
        transition
    }

    /// Step for `duration_ms` of simulated time, collecting transitions.
    pub fn run_for(&mut self, duration_ms: u64) -> Vec<Transition> {
        let steps = duration_ms / self.tick.as_millis().max(1) as u64;
        (0..steps).filter_map(|_| self.step()).collect()
    }

    /// Step until the state machine reaches `state`, for at most `max_ms`.
    pub fn run_until_state(&mut self, state: FlagState, max_ms: u64) -> bool {
        let steps = max_ms / self.tick.as_millis().max(1) as u64;
        for _ in 0..steps {
            self.step();
            if self.control.state() == state {
                return true;
            }
        }
        false
    }

    /// Apply a command through the loop's scheduler at the current time.
    pub fn configure(&mut self, json: &str) -> i32 {
        let now = self.clock.utc_now();
        self.control.scheduler_mut().configure(json, now)
    }

    pub fn submit(&mut self, json: &str) -> i32 {
        let now = self.clock.utc_now();
        self.control.scheduler_mut().submit_event(json, now)
    }
}
