//! Test data builders and fixtures.
//!
//! Builders use fixed identifiers so assertions can compare exact payloads.

use std::sync::Arc;

use beagle_core::{
    Endpoint, GenericPeripheral, IBeaconPeripheral, Message, Peripheral, PeripheralEvent,
    Proximity, Subscriber,
};

/// Proximity UUID used by [`ibeacon`].
pub const TEST_BEACON_UUID: &str = "f7826da6-4fa2-4e98-8024-bc5b71e0893e";

/// Beacon with [`TEST_BEACON_UUID`], near and 1.5m away.
pub fn ibeacon(major: u16, minor: u16) -> Arc<dyn Peripheral> {
    Arc::new(IBeaconPeripheral::new(TEST_BEACON_UUID, major, minor, Proximity::Near, 1.5))
}

/// Generic peripheral with an unknown proximity.
pub fn generic(key: &str) -> Arc<dyn Peripheral> {
    Arc::new(GenericPeripheral::new(key, Proximity::Unknown, 0.0))
}

/// Subscriber posting JSON to `url`.
pub fn post_subscriber(name: &str, url: &str) -> Subscriber {
    Subscriber::new(name, Endpoint::new(format!("{name}-endpoint"), "POST", url))
}

/// Subscriber calling `url` with GET and a query string.
pub fn get_subscriber(name: &str, url: &str) -> Subscriber {
    Subscriber::new(name, Endpoint::new(format!("{name}-endpoint"), "GET", url))
}

/// Builder for dispatch messages.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    event_name: String,
    target_name: String,
    peripheral: Option<Arc<dyn Peripheral>>,
    subscribers: Vec<Subscriber>,
}

impl MessageBuilder {
    /// `found` message for target `lobby` about beacon `1/2`, no subscribers.
    pub fn new() -> Self {
        Self {
            event_name: PeripheralEvent::Found.as_str().to_string(),
            target_name: "lobby".to_string(),
            peripheral: Some(ibeacon(1, 2)),
            subscribers: Vec::new(),
        }
    }

    /// Sets the event.
    #[must_use]
    pub fn event(mut self, event: PeripheralEvent) -> Self {
        self.event_name = event.as_str().to_string();
        self
    }

    /// Sets a raw event name, which may be invalid.
    #[must_use]
    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }

    /// Sets the target name.
    #[must_use]
    pub fn target(mut self, name: impl Into<String>) -> Self {
        self.target_name = name.into();
        self
    }

    /// Sets the peripheral.
    #[must_use]
    pub fn peripheral(mut self, peripheral: Arc<dyn Peripheral>) -> Self {
        self.peripheral = Some(peripheral);
        self
    }

    /// Removes the peripheral.
    #[must_use]
    pub fn without_peripheral(mut self) -> Self {
        self.peripheral = None;
        self
    }

    /// Appends a subscriber.
    #[must_use]
    pub fn subscriber(mut self, subscriber: Subscriber) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the message.
    pub fn build(self) -> Message {
        Message {
            event_name: self.event_name,
            target_name: self.target_name,
            peripheral: self.peripheral,
            subscribers: self.subscribers,
        }
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
