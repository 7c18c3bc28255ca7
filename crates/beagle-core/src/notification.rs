//! Notification model: who gets told about which peripheral event.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{error::UnsupportedEventName, peripheral::Peripheral};

/// The two sightings the discovery pipeline reports.
///
/// Doubles as the broker topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeripheralEvent {
    /// A tracked peripheral became visible.
    Found,
    /// A tracked peripheral disappeared.
    Lost,
}

impl PeripheralEvent {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Lost => "lost",
        }
    }
}

impl fmt::Display for PeripheralEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeripheralEvent {
    type Err = UnsupportedEventName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "found" => Ok(Self::Found),
            "lost" => Ok(Self::Lost),
            other => Err(UnsupportedEventName(other.to_string())),
        }
    }
}

/// HTTP destination of a subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Display name used in logs.
    #[serde(default)]
    pub name: String,
    /// Destination URL. Must be non-empty to be deliverable.
    #[serde(default)]
    pub url: String,
    /// HTTP method, case-insensitive. `POST` sends a JSON body, anything
    /// else sends a query string. Empty means `GET`.
    #[serde(default)]
    pub method: String,
    /// Headers applied after the defaults.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Endpoint {
    /// Creates an endpoint without custom headers.
    pub fn new(name: impl Into<String>, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into(), method: method.into(), headers: HashMap::new() }
    }

    /// Adds a header, replacing any previous value under the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Named party notified about peripheral events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Subscriber name.
    pub name: String,
    /// Where to deliver. `None` makes delivery a silent no-op.
    #[serde(default)]
    pub endpoint: Option<Endpoint>,
}

impl Subscriber {
    /// Creates a subscriber with an endpoint.
    pub fn new(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self { name: name.into(), endpoint: Some(endpoint) }
    }

    /// Creates a subscriber that has nowhere to deliver.
    pub fn without_endpoint(name: impl Into<String>) -> Self {
        Self { name: name.into(), endpoint: None }
    }
}

/// Input of one dispatch.
///
/// `event_name` stays a raw string because it is validated by the dispatcher,
/// which rejects anything but `found` and `lost`.
#[derive(Debug, Clone)]
pub struct Message {
    /// Raw event name.
    pub event_name: String,
    /// Logical name of the monitored target.
    pub target_name: String,
    /// The peripheral the event is about.
    pub peripheral: Option<Arc<dyn Peripheral>>,
    /// Subscribers in delivery order.
    pub subscribers: Vec<Subscriber>,
}

impl Message {
    /// Creates a message for a known event.
    pub fn new(
        event: PeripheralEvent,
        target_name: impl Into<String>,
        peripheral: Arc<dyn Peripheral>,
        subscribers: Vec<Subscriber>,
    ) -> Self {
        Self {
            event_name: event.as_str().to_string(),
            target_name: target_name.into(),
            peripheral: Some(peripheral),
            subscribers,
        }
    }
}
