//! Pub/sub seam between the discovery pipeline and its consumers.
//!
//! ```text
//!                     found / lost
//! ┌───────────────┐   (peripheral,    ┌──────────────────────┐
//! │ Discovery     │    registered)    │ InMemoryEventBroker  │
//! │ (Producer)    │ ─────────────────▶│ (topic → handlers)   │
//! └───────────────┘                   └──────────────────────┘
//!                                         │            │
//!                                         ▼            ▼
//!                               ┌──────────────┐ ┌───────────────────┐
//!                               │ Notifier     │ │ ActivityDirectory │
//!                               └──────────────┘ └───────────────────┘
//! ```
//!
//! Handlers are synchronous and may be invoked concurrently from several
//! producers. They must not block.

use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;
use tracing::trace;

use crate::{notification::PeripheralEvent, peripheral::Peripheral};

/// Callback invoked for each published sighting.
pub trait PeripheralHandler: Send + Sync {
    /// Handles one sighting. `registered` tells whether the peripheral
    /// matched a configured target.
    fn handle(&self, peripheral: &Arc<dyn Peripheral>, registered: bool);
}

impl<F> PeripheralHandler for F
where
    F: Fn(&Arc<dyn Peripheral>, bool) + Send + Sync,
{
    fn handle(&self, peripheral: &Arc<dyn Peripheral>, registered: bool) {
        self(peripheral, registered);
    }
}

/// Subscription side of the event bus.
pub trait EventBroker: Send + Sync {
    /// Registers `handler` for every future event on `topic`.
    fn subscribe(&self, topic: PeripheralEvent, handler: Arc<dyn PeripheralHandler>);
}

/// Process-local broker that fans sightings out to subscribed handlers.
#[derive(Default)]
pub struct InMemoryEventBroker {
    handlers: RwLock<HashMap<PeripheralEvent, Vec<Arc<dyn PeripheralHandler>>>>,
}

impl InMemoryEventBroker {
    /// Creates a broker with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a sighting to every handler of `topic`.
    ///
    /// Handlers run on the caller's thread, outside the registry lock, in
    /// subscription order. Returns the number of handlers invoked.
    pub fn publish(
        &self,
        topic: PeripheralEvent,
        peripheral: Arc<dyn Peripheral>,
        registered: bool,
    ) -> usize {
        let handlers = self.handlers.read().get(&topic).cloned().unwrap_or_default();

        trace!(
            topic = %topic,
            peripheral = peripheral.unique_key(),
            registered,
            handlers = handlers.len(),
            "publishing peripheral event"
        );

        for handler in &handlers {
            handler.handle(&peripheral, registered);
        }

        handlers.len()
    }

    /// Number of handlers subscribed to `topic`.
    pub fn subscriber_count(&self, topic: PeripheralEvent) -> usize {
        self.handlers.read().get(&topic).map_or(0, Vec::len)
    }
}

impl EventBroker for InMemoryEventBroker {
    fn subscribe(&self, topic: PeripheralEvent, handler: Arc<dyn PeripheralHandler>) {
        self.handlers.write().entry(topic).or_default().push(handler);
    }
}

impl fmt::Debug for InMemoryEventBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        f.debug_struct("InMemoryEventBroker")
            .field("found", &handlers.get(&PeripheralEvent::Found).map_or(0, Vec::len))
            .field("lost", &handlers.get(&PeripheralEvent::Lost).map_or(0, Vec::len))
            .finish()
    }
}
