//! Activity directory backed by an ordered map.

use std::{collections::BTreeMap, fmt, sync::Arc};

use beagle_core::{Clock, EventBroker, Peripheral, PeripheralEvent, PeripheralKind, Proximity};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

/// Last known state of a visible peripheral.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Unique key of the peripheral.
    pub key: String,
    /// Kind tag at the last sighting.
    pub kind: PeripheralKind,
    /// Proximity at the last sighting.
    pub proximity: Proximity,
    /// Whether the peripheral belongs to a configured target.
    pub registered: bool,
    /// When the last `found` was recorded.
    pub time: DateTime<Utc>,
}

/// Concurrently readable set of visible peripherals.
pub struct ActivityDirectory {
    records: RwLock<BTreeMap<String, Record>>,
    clock: Arc<dyn Clock>,
}

impl ActivityDirectory {
    /// Creates an empty directory stamping records with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { records: RwLock::new(BTreeMap::new()), clock }
    }

    /// Subscribes to both topics of `broker` and returns the directory.
    pub fn use_broker(self: Arc<Self>, broker: &dyn EventBroker) -> Arc<Self> {
        let directory = Arc::clone(&self);
        broker.subscribe(
            PeripheralEvent::Found,
            Arc::new(move |peripheral: &Arc<dyn Peripheral>, registered: bool| {
                directory.record_found(peripheral.as_ref(), registered);
            }),
        );

        let directory = Arc::clone(&self);
        broker.subscribe(
            PeripheralEvent::Lost,
            Arc::new(move |peripheral: &Arc<dyn Peripheral>, _registered: bool| {
                directory.record_lost(peripheral.as_ref());
            }),
        );

        self
    }

    /// Inserts or replaces the record for `peripheral`.
    pub fn record_found(&self, peripheral: &dyn Peripheral, registered: bool) {
        let record = Record {
            key: peripheral.unique_key().to_string(),
            kind: peripheral.kind().clone(),
            proximity: peripheral.proximity(),
            registered,
            time: self.clock.now(),
        };

        let replaced = self.records.write().insert(record.key.clone(), record).is_some();
        debug!(peripheral = peripheral.unique_key(), replaced, "peripheral visible");
    }

    /// Removes the record for `peripheral`, if any.
    pub fn record_lost(&self, peripheral: &dyn Peripheral) {
        let removed = self.records.write().remove(peripheral.unique_key()).is_some();
        debug!(peripheral = peripheral.unique_key(), removed, "peripheral gone");
    }

    /// Number of visible peripherals.
    pub fn quantity(&self) -> usize {
        self.records.read().len()
    }

    /// Copies of up to `take` records after the first `skip`, ascending by
    /// key. `take == 0` returns everything after `skip`.
    pub fn records(&self, take: usize, skip: usize) -> Vec<Record> {
        let records = self.records.read();
        let take = if take == 0 { records.len() } else { take };

        records.values().skip(skip).take(take).cloned().collect()
    }

    /// Copy of the record for `key`.
    pub fn get(&self, key: &str) -> Option<Record> {
        self.records.read().get(key).cloned()
    }
}

impl fmt::Debug for ActivityDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityDirectory").field("quantity", &self.quantity()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use beagle_core::{GenericPeripheral, IBeaconPeripheral, InMemoryEventBroker, TestClock};

    use super::*;

    fn beacon(minor: u16, proximity: Proximity) -> Arc<dyn Peripheral> {
        Arc::new(IBeaconPeripheral::new("U1", 1, minor, proximity, 1.0))
    }

    #[test]
    fn found_upserts_latest_state() {
        let clock = TestClock::new();
        let directory = ActivityDirectory::new(Arc::new(clock.clone()));

        directory.record_found(beacon(1, Proximity::Far).as_ref(), false);
        clock.advance(Duration::from_secs(5));
        directory.record_found(beacon(1, Proximity::Immediate).as_ref(), true);

        assert_eq!(directory.quantity(), 1);
        let record = directory.get("U1-1-1").unwrap();
        assert_eq!(record.proximity, Proximity::Immediate);
        assert!(record.registered);
        assert_eq!(record.kind, PeripheralKind::IBeacon);
        assert_eq!(record.time, clock.now());
    }

    #[test]
    fn lost_removes_and_ignores_unknown_keys() {
        let directory = ActivityDirectory::new(Arc::new(TestClock::new()));

        directory.record_found(beacon(1, Proximity::Near).as_ref(), false);
        directory.record_lost(beacon(2, Proximity::Near).as_ref());
        assert_eq!(directory.quantity(), 1);

        directory.record_lost(beacon(1, Proximity::Near).as_ref());
        assert_eq!(directory.quantity(), 0);
        assert!(directory.get("U1-1-1").is_none());
    }

    #[test]
    fn pages_are_ordered_by_key() {
        let directory = ActivityDirectory::new(Arc::new(TestClock::new()));
        for key in ["c", "a", "e", "b", "d"] {
            directory.record_found(&GenericPeripheral::new(key, Proximity::Unknown, 0.0), false);
        }

        let keys = |records: Vec<Record>| records.into_iter().map(|r| r.key).collect::<Vec<_>>();

        assert_eq!(keys(directory.records(0, 0)), ["a", "b", "c", "d", "e"]);
        assert_eq!(keys(directory.records(2, 0)), ["a", "b"]);
        assert_eq!(keys(directory.records(2, 2)), ["c", "d"]);
        assert_eq!(keys(directory.records(0, 3)), ["d", "e"]);
        assert!(directory.records(3, 10).is_empty());
    }

    #[test]
    fn returned_records_are_copies() {
        let directory = ActivityDirectory::new(Arc::new(TestClock::new()));
        directory.record_found(beacon(1, Proximity::Near).as_ref(), false);

        let mut page = directory.records(0, 0);
        page[0].registered = true;
        directory.record_lost(beacon(1, Proximity::Near).as_ref());

        assert_eq!(page.len(), 1);
        assert!(!directory.records(0, 0).iter().any(|r| r.registered));
    }

    #[test]
    fn broker_events_drive_the_directory() {
        let broker = InMemoryEventBroker::new();
        let directory =
            Arc::new(ActivityDirectory::new(Arc::new(TestClock::new()))).use_broker(&broker);

        broker.publish(PeripheralEvent::Found, beacon(1, Proximity::Near), true);
        broker.publish(PeripheralEvent::Found, beacon(2, Proximity::Far), false);
        assert_eq!(directory.quantity(), 2);

        broker.publish(PeripheralEvent::Lost, beacon(1, Proximity::Near), true);
        assert_eq!(directory.quantity(), 1);
        assert_eq!(directory.records(0, 0)[0].key, "U1-1-2");
    }

    #[test]
    fn record_serializes_with_lowercase_proximity() {
        let clock = TestClock::new();
        let directory = ActivityDirectory::new(Arc::new(clock.clone()));
        directory.record_found(beacon(7, Proximity::Immediate).as_ref(), true);

        let json = serde_json::to_value(directory.get("U1-1-7").unwrap()).unwrap();
        assert_eq!(json["key"], "U1-1-7");
        assert_eq!(json["kind"], "ibeacon");
        assert_eq!(json["proximity"], "immediate");
        assert_eq!(json["registered"], true);
        assert!(json["time"].is_string());
    }
}
