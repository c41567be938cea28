//! Fixed-capacity flag event storage.

use chrono::{DateTime, Utc};

use super::errors::ScheduleError;
use super::event::FlagEvent;
use super::matching::event_applies;
use super::settings::SchedulerConfig;
use crate::common::constants::EVENT_CAPACITY;

/// What `EventStore::receive` did with an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// New event placed in this slot.
    Stored(usize),
    /// Existing event replaced by a newer version.
    Updated(usize),
    /// Existing event removed.
    Deleted(usize),
    /// Not newer than the stored version; discarded.
    Stale,
    /// Delete for an id that is not stored.
    NothingToDelete,
}

impl Receipt {
    /// Whether the store contents changed.
    pub fn changed(self) -> bool {
        matches!(self, Receipt::Stored(_) | Receipt::Updated(_) | Receipt::Deleted(_))
    }
}

/// Slot array of at most [`EVENT_CAPACITY`] events, at most one per id.
#[derive(Debug, Clone)]
pub struct EventStore {
    slots: [Option<FlagEvent>; EVENT_CAPACITY],
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn slots(&self) -> &[Option<FlagEvent>] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&FlagEvent> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self, id: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|event| event.id == id))
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = None;
        }
    }

    /// Put a previously persisted event back into its slot.
    pub(crate) fn restore(&mut self, index: usize, event: FlagEvent) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(event);
        }
    }

    /// Insert, update or delete according to the incoming event's id and
    /// version. A strictly higher version replaces a stored event; a delete
    /// needs at least the stored version.
    pub fn receive(
        &mut self,
        mut incoming: FlagEvent,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Result<Receipt, ScheduleError> {
        if incoming.id == 0 || !incoming.valid {
            return Err(ScheduleError::Parse("event has no valid id".into()));
        }

        if let Some(index) = self.position(incoming.id) {
            let stored_version = self.slots[index].as_ref().map_or(0, |e| e.version);

            if incoming.is_delete {
                if incoming.version < stored_version {
                    return Ok(Receipt::Stale);
                }
                self.slots[index] = None;
                return Ok(Receipt::Deleted(index));
            }

            if incoming.version <= stored_version {
                return Ok(Receipt::Stale);
            }
            incoming.applies = event_applies(&incoming, config);
            self.slots[index] = Some(incoming);
            return Ok(Receipt::Updated(index));
        }

        if incoming.is_delete {
            return Ok(Receipt::NothingToDelete);
        }

        self.purge(now);
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ScheduleError::Overflow)?;
        incoming.applies = event_applies(&incoming, config);
        self.slots[index] = Some(incoming);
        Ok(Receipt::Stored(index))
    }

    /// Clear events that are invalid, have no begin, or whose defined end is
    /// strictly before `now`. Returns how many were cleared.
    pub fn purge(&mut self, now: DateTime<Utc>) -> usize {
        let mut purged = 0;
        for slot in self.slots.iter_mut() {
            let stale = slot.as_ref().is_some_and(|event| {
                !event.valid || event.begin.is_none() || event.end.is_some_and(|end| end < now)
            });
            if stale {
                *slot = None;
                purged += 1;
            }
        }
        purged
    }

    /// Re-resolve every event's marks under `config` and recompute whether it
    /// applies. Events that no longer parse are cleared; events that parse but
    /// do not apply are kept, since a later configuration may change that.
    ///
    /// Returns how many were cleared.
    pub fn reprocess(&mut self, config: &SchedulerConfig) -> usize {
        let mut cleared = 0;
        for slot in self.slots.iter_mut() {
            let Some(event) = slot.as_mut() else {
                continue;
            };
            if !event.valid || event.resolve_marks(config).is_err() {
                *slot = None;
                cleared += 1;
                continue;
            }
            event.applies = event_applies(event, config);
        }
        cleared
    }

    /// Valid events that apply here.
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|event| event.valid && event.applies)
            .count()
    }

    /// Id of the first valid, applicable event whose window covers `now`.
    pub fn first_active(&self, now: DateTime<Utc>) -> Option<u32> {
        self.slots
            .iter()
            .flatten()
            .find(|event| event.valid && event.applies && event.is_current(now))
            .map(|event| event.id)
    }

    /// `"<id>.<version>"` per slot, `None` for empty slots.
    pub fn id_versions(&self) -> Vec<Option<String>> {
        self.slots
            .iter()
            .map(|slot| {
                slot.as_ref()
                    .filter(|event| event.valid)
                    .map(FlagEvent::id_version)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            federal_jurisdiction: "US".into(),
            state_jurisdiction: "US-TN".into(),
            top_flag: "TN".into(),
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    fn event(id: u32, version: u32, begin_hours: i64, end_hours: Option<i64>) -> FlagEvent {
        let mut event = FlagEvent::new(id, version);
        event.jurisdiction = "US".into();
        event.flag_code = "US".into();
        event.begin = Some(now() + Duration::hours(begin_hours));
        event.end = end_hours.map(|h| now() + Duration::hours(h));
        event
    }

    #[test]
    fn test_higher_version_replaces() {
        let mut store = EventStore::new();
        assert_eq!(store.receive(event(1, 1, 1, Some(2)), &config(), now()), Ok(Receipt::Stored(0)));

        let mut newer = event(1, 2, 3, Some(4));
        newer.jurisdiction = "US-TN".into();
        assert_eq!(store.receive(newer, &config(), now()), Ok(Receipt::Updated(0)));

        let stored = store.get(0).unwrap();
        assert_eq!(stored.version, 2);
        assert!(stored.applies);
    }

    #[test]
    fn test_equal_or_lower_version_is_stale() {
        let mut store = EventStore::new();
        store.receive(event(1, 5, 1, Some(2)), &config(), now()).unwrap();

        assert_eq!(store.receive(event(1, 5, 9, Some(10)), &config(), now()), Ok(Receipt::Stale));
        assert_eq!(store.receive(event(1, 4, 9, Some(10)), &config(), now()), Ok(Receipt::Stale));
        assert_eq!(store.get(0).unwrap().begin, Some(now() + Duration::hours(1)));
    }

    #[test]
    fn test_delete_semantics() {
        let mut store = EventStore::new();
        store.receive(event(3, 2, 1, Some(2)), &config(), now()).unwrap();

        let mut old_delete = event(3, 1, 0, None);
        old_delete.is_delete = true;
        assert_eq!(store.receive(old_delete, &config(), now()), Ok(Receipt::Stale));

        let mut delete = event(3, 2, 0, None);
        delete.is_delete = true;
        assert_eq!(store.receive(delete.clone(), &config(), now()), Ok(Receipt::Deleted(0)));
        assert!(store.is_empty());

        assert_eq!(store.receive(delete, &config(), now()), Ok(Receipt::NothingToDelete));
        assert!(store.is_empty());
    }

    #[test]
    fn test_overflow_leaves_store_untouched() {
        let mut store = EventStore::new();
        for id in 1..=EVENT_CAPACITY as u32 {
            store.receive(event(id, 1, 1, None), &config(), now()).unwrap();
        }
        assert_eq!(store.len(), EVENT_CAPACITY);

        let result = store.receive(event(99, 1, 1, None), &config(), now());
        assert_eq!(result, Err(ScheduleError::Overflow));
        assert_eq!(store.len(), EVENT_CAPACITY);
        assert!(store.position(99).is_none());
    }

    #[test]
    fn test_insert_purges_to_make_room() {
        let mut store = EventStore::new();
        for id in 1..=EVENT_CAPACITY as u32 {
            store.receive(event(id, 1, 1, Some(2)), &config(), now()).unwrap();
        }

        let later = now() + Duration::hours(3);
        assert_eq!(store.receive(event(99, 1, 4, None), &config(), later), Ok(Receipt::Stored(0)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_purge_removes_exactly_stale_events() {
        let mut store = EventStore::new();
        let mut invalid = event(1, 1, 1, None);
        invalid.valid = false;
        store.restore(0, invalid);
        let mut beginless = event(2, 1, 0, None);
        beginless.begin = None;
        store.restore(1, beginless);
        store.restore(2, event(3, 1, -5, Some(-1)));
        store.restore(3, event(4, 1, -5, None));
        store.restore(4, event(5, 1, 2, Some(3)));
        store.restore(5, event(6, 1, -5, Some(0)));

        assert_eq!(store.purge(now()), 3);
        let remaining: Vec<u32> = store.slots().iter().flatten().map(|e| e.id).collect();
        // An end exactly at `now` is not yet in the past.
        assert_eq!(remaining, vec![4, 5, 6]);
    }

    #[test]
    fn test_reprocess_reresolves_and_rechecks_applicability() {
        let mut store = EventStore::new();
        let mut e = event(1, 1, 0, None);
        e.begin_mark = "2025-07-04 13:00L".into();
        e.jurisdiction = "US-TN".into();
        e.flag_code = "TN".into();
        store.restore(0, e);
        let mut broken = event(2, 1, 0, None);
        broken.begin_mark = "garbage".into();
        store.restore(1, broken);

        let mut config = config();
        config.utc_offset_hours = -6.0;
        assert_eq!(store.reprocess(&config), 1);
        let e = store.get(0).unwrap();
        assert!(e.applies);
        assert_eq!(e.begin, Some(Utc.with_ymd_and_hms(2025, 7, 4, 19, 0, 0).unwrap()));

        config.state_jurisdiction = "US-VA".into();
        config.top_flag = "VA".into();
        store.reprocess(&config);
        assert!(!store.get(0).unwrap().applies);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_active_queries() {
        let mut store = EventStore::new();
        store.receive(event(1, 1, 2, Some(3)), &config(), now()).unwrap();
        store.receive(event(2, 1, -1, Some(1)), &config(), now()).unwrap();
        let mut foreign = event(3, 1, -1, None);
        foreign.jurisdiction = "CA".into();
        store.receive(foreign, &config(), now()).unwrap();

        assert_eq!(store.active_count(), 2);
        assert_eq!(store.first_active(now()), Some(2));
        assert_eq!(
            store.id_versions()[..4],
            [Some("1.1".to_string()), Some("2.1".to_string()), Some("3.1".to_string()), None]
        );
    }
}
