//! Bridge from broker sightings to dispatcher messages.
//!
//! A target names one tracked peripheral and lists who wants to hear about
//! it. For every sighting of a registered peripheral the notifier builds a
//! [`Message`] and hands it to the dispatcher.

use std::{collections::HashMap, sync::Arc};

use beagle_core::{EventBroker, Message, Peripheral, PeripheralEvent, Subscriber};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{dispatcher::Dispatcher, error::Result};

/// A tracked peripheral and its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Logical name reported to subscribers.
    pub name: String,
    /// Unique key of the peripheral.
    pub key: String,
    /// Subscribers notified in this order.
    #[serde(default)]
    pub subscribers: Vec<Subscriber>,
}

/// Turns sightings of configured targets into dispatches.
#[derive(Debug)]
pub struct Notifier {
    targets: HashMap<String, Target>,
    dispatcher: Arc<Dispatcher>,
}

impl Notifier {
    /// Creates a notifier for `targets`. Later targets replace earlier ones
    /// with the same key.
    pub fn new(dispatcher: Arc<Dispatcher>, targets: impl IntoIterator<Item = Target>) -> Self {
        let targets = targets.into_iter().map(|t| (t.key.clone(), t)).collect();
        Self { targets, dispatcher }
    }

    /// True when `key` belongs to a configured target.
    ///
    /// Producers use this to compute the `registered` flag they publish.
    pub fn is_registered(&self, key: &str) -> bool {
        self.targets.contains_key(key)
    }

    /// Target configured for `key`.
    pub fn target(&self, key: &str) -> Option<&Target> {
        self.targets.get(key)
    }

    /// Dispatches `event` for `peripheral` if it is a registered target.
    ///
    /// Returns `Ok(true)` when a message was queued and `Ok(false)` when the
    /// sighting was ignored.
    ///
    /// # Errors
    ///
    /// Propagates call rejections from [`Dispatcher::send`].
    pub fn notify(
        &self,
        event: PeripheralEvent,
        peripheral: &Arc<dyn Peripheral>,
        registered: bool,
    ) -> Result<bool> {
        let key = peripheral.unique_key();

        if !registered {
            debug!(peripheral = key, event = %event, "ignoring unregistered peripheral");
            return Ok(false);
        }

        let Some(target) = self.targets.get(key) else {
            warn!(peripheral = key, event = %event, "registered peripheral has no target");
            return Ok(false);
        };

        let message = Message::new(
            event,
            target.name.clone(),
            peripheral.clone(),
            target.subscribers.clone(),
        );
        self.dispatcher.send(message)?;

        Ok(true)
    }

    /// Subscribes to both topics of `broker`.
    pub fn use_broker(self: &Arc<Self>, broker: &dyn EventBroker) {
        for event in [PeripheralEvent::Found, PeripheralEvent::Lost] {
            let notifier = Arc::clone(self);
            broker.subscribe(
                event,
                Arc::new(move |peripheral: &Arc<dyn Peripheral>, registered: bool| {
                    if let Err(e) = notifier.notify(event, peripheral, registered) {
                        error!(
                            peripheral = peripheral.unique_key(),
                            event = %event,
                            error = %e,
                            "failed to dispatch peripheral event"
                        );
                    }
                }),
            );
        }
    }
}
