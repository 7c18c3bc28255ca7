//! Core domain types for proximity notifications.
//!
//! Provides the peripheral capability model, the notification model
//! (endpoints, subscribers, messages), the in-process event broker that
//! routes `found`/`lost` sightings, and the clock abstraction. The delivery
//! and activity crates build on these types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broker;
pub mod error;
pub mod notification;
pub mod peripheral;
pub mod time;

pub use broker::{EventBroker, InMemoryEventBroker, PeripheralHandler};
pub use error::{PayloadError, UnsupportedEventName};
pub use notification::{Endpoint, Message, PeripheralEvent, Subscriber};
pub use peripheral::{
    format_accuracy, GenericPeripheral, IBeaconPeripheral, PayloadFields, Peripheral,
    PeripheralKind, Proximity,
};
pub use time::{Clock, SystemClock, TestClock};
