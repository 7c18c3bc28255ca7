//! Delivery outcomes and the in-process listener registry.
//!
//! Every accepted message produces one [`DeliveryOutcome`] per subscriber.
//! When a batch completes, the whole list is handed to each registered
//! [`DeliveryListener`] in registration order.
//!
//! Listeners are addressed by the [`ListenerHandle`] returned on
//! registration. The registry is snapshotted before each emission, so
//! adding or removing listeners while batches are in flight is safe; a
//! batch that already took its snapshot still reaches a listener removed
//! after that point.

use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use beagle_core::{PeripheralEvent, Subscriber};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::error::{panic_message, DeliveryError, Result};

/// Result of one subscriber's delivery attempt. Never mutated.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// Event that was delivered.
    pub event: PeripheralEvent,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
    /// Logical target name from the message.
    pub target_name: String,
    /// Subscriber the attempt was for.
    pub subscriber: Subscriber,
    /// True iff no error occurred.
    pub delivered: bool,
    /// Present iff `delivered` is false.
    pub error: Option<DeliveryError>,
}

impl DeliveryOutcome {
    /// Builds an outcome from the result of a single delivery.
    pub fn from_result(
        event: PeripheralEvent,
        timestamp: DateTime<Utc>,
        target_name: impl Into<String>,
        subscriber: Subscriber,
        result: Result<()>,
    ) -> Self {
        let error = result.err();
        Self {
            event,
            timestamp,
            target_name: target_name.into(),
            subscriber,
            delivered: error.is_none(),
            error,
        }
    }
}

/// Receives completed batches.
#[async_trait]
pub trait DeliveryListener: Send + Sync + fmt::Debug {
    /// Called once per batch with every outcome of that batch.
    ///
    /// Runs on the dispatch worker that delivered the batch; a slow
    /// listener holds that worker.
    async fn on_batch(&self, outcomes: &[DeliveryOutcome]);
}

/// Adapter registering a plain closure as a listener.
pub struct FnListener<F>(F);

impl<F> FnListener<F>
where
    F: Fn(&[DeliveryOutcome]) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> DeliveryListener for FnListener<F>
where
    F: Fn(&[DeliveryOutcome]) + Send + Sync,
{
    async fn on_batch(&self, outcomes: &[DeliveryOutcome]) {
        (self.0)(outcomes);
    }
}

/// Opaque token identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Ordered, lock-protected set of listeners.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerHandle, Arc<dyn DeliveryListener>)>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener and returns its handle.
    pub fn add(&self, listener: Arc<dyn DeliveryListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((handle, listener));
        handle
    }

    /// Removes the listener registered under `handle`.
    ///
    /// Returns false if the handle is unknown or was already removed.
    pub fn remove(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|(h, _)| *h == handle) {
            Some(index) => {
                listeners.remove(index);
                true
            },
            None => false,
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True when nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Copies the current listeners in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn DeliveryListener>> {
        self.listeners.read().iter().map(|(_, listener)| listener.clone()).collect()
    }

    /// Hands `outcomes` to every listener, one after another.
    ///
    /// A panicking listener is logged and skipped; the listeners after it
    /// still receive the batch.
    pub async fn emit(&self, outcomes: &[DeliveryOutcome]) {
        if outcomes.is_empty() {
            return;
        }

        let listeners = self.snapshot();
        debug!(
            listeners = listeners.len(),
            outcomes = outcomes.len(),
            "emitting delivery outcomes"
        );

        for (position, listener) in listeners.into_iter().enumerate() {
            let delivered = AssertUnwindSafe(listener.on_batch(outcomes)).catch_unwind().await;
            if let Err(payload) = delivered {
                error!(
                    position,
                    panic = %panic_message(payload.as_ref()),
                    "delivery listener panicked"
                );
            }
        }
    }
}
