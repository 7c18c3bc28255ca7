//! Dispatcher: validates messages and hands them to the worker pool.
//!
//! ```text
//! ┌────────────┐ send() ┌──────────────┐    ┌─────────────┐   ┌───────────┐
//! │ Caller     │───────▶│ Bounded queue│───▶│ Worker pool │──▶│ Transport │
//! └────────────┘        └──────────────┘    └─────────────┘   └───────────┘
//!       ▲                                          │
//!       │ UnsupportedEventName / QueueFull         ▼
//!       │ DispatcherClosed                 ┌───────────────────┐
//!                                          │ Listener registry │
//!                                          └───────────────────┘
//! ```
//!
//! `send` never waits for I/O: it validates the event name, then tries to
//! enqueue. Per-subscriber results are only visible to listeners.

use std::{sync::Arc, time::Duration};

use beagle_core::{Clock, Message, PeripheralEvent, SystemClock};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, mpsc::error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    client::{ClientConfig, HttpTransport, Transport},
    error::{DeliveryError, Result},
    listener::{DeliveryListener, DeliveryOutcome, FnListener, ListenerHandle, ListenerRegistry},
    worker::{Batch, BatchProcessor, DispatcherStats},
    worker_pool::WorkerPool,
};

/// Configuration for the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Number of batches delivered concurrently.
    pub worker_count: usize,

    /// Messages that may wait for a worker before `send` rejects.
    pub queue_capacity: usize,

    /// Maximum time to wait for queued batches on shutdown.
    pub shutdown_timeout: Duration,

    /// HTTP transport configuration.
    pub client_config: ClientConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::DEFAULT_WORKER_COUNT,
            queue_capacity: crate::DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout: Duration::from_secs(30),
            client_config: ClientConfig::default(),
        }
    }
}

/// Fans peripheral events out to subscriber endpoints.
pub struct Dispatcher {
    config: DispatcherConfig,
    sender: RwLock<Option<mpsc::Sender<Batch>>>,
    worker_pool: Mutex<Option<WorkerPool>>,
    listeners: Arc<ListenerRegistry>,
    stats: Arc<RwLock<DispatcherStats>>,
}

impl Dispatcher {
    /// Starts a dispatcher delivering through `transport`.
    ///
    /// Spawns the worker pool, so it must be called inside a tokio runtime.
    /// Zero values for `worker_count` or `queue_capacity` are raised to one.
    pub fn start(
        config: DispatcherConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let worker_count = config.worker_count.max(1);
        let queue_capacity = config.queue_capacity.max(1);

        info!(worker_count, queue_capacity, "starting peripheral event dispatcher");

        let listeners = Arc::new(ListenerRegistry::new());
        let stats = Arc::new(RwLock::new(DispatcherStats::default()));
        let processor =
            Arc::new(BatchProcessor::new(transport, listeners.clone(), clock, stats.clone()));

        let (sender, receiver) = mpsc::channel(queue_capacity);
        let mut worker_pool = WorkerPool::new(
            receiver,
            processor,
            worker_count,
            stats.clone(),
            CancellationToken::new(),
        );
        worker_pool.spawn_workers();

        Self {
            config: DispatcherConfig { worker_count, queue_capacity, ..config },
            sender: RwLock::new(Some(sender)),
            worker_pool: Mutex::new(Some(worker_pool)),
            listeners,
            stats,
        }
    }

    /// Starts a dispatcher with the reqwest transport and the system clock.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn with_http_transport(config: DispatcherConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.client_config.clone())?);
        Ok(Self::start(config, transport, Arc::new(SystemClock::new())))
    }

    /// Schedules delivery of `message` to all of its subscribers.
    ///
    /// Returns as soon as the message is queued; no subscriber has been
    /// contacted yet.
    ///
    /// # Errors
    ///
    /// - `UnsupportedEventName` if the event is not `found` or `lost`
    /// - `QueueFull` if `queue_capacity` messages are already waiting
    /// - `DispatcherClosed` after [`Dispatcher::shutdown`]
    pub fn send(&self, message: Message) -> Result<()> {
        let event = message.event_name.parse::<PeripheralEvent>().map_err(|e| {
            warn!(event = %message.event_name, target = %message.target_name, "rejecting message");
            DeliveryError::from(e)
        })?;

        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            return Err(DeliveryError::DispatcherClosed);
        };

        match sender.try_send(Batch { event, message }) {
            Ok(()) => {
                debug!(event = %event, "message queued for delivery");
                Ok(())
            },
            Err(TrySendError::Full(batch)) => {
                warn!(
                    event = %event,
                    target = %batch.message.target_name,
                    capacity = self.config.queue_capacity,
                    "dispatch queue full, rejecting message"
                );
                Err(DeliveryError::QueueFull { capacity: self.config.queue_capacity })
            },
            Err(TrySendError::Closed(_)) => Err(DeliveryError::DispatcherClosed),
        }
    }

    /// Registers a listener for completed batches.
    pub fn add_listener(&self, listener: Arc<dyn DeliveryListener>) -> ListenerHandle {
        self.listeners.add(listener)
    }

    /// Registers a closure for completed batches.
    pub fn add_listener_fn<F>(&self, f: F) -> ListenerHandle
    where
        F: Fn(&[DeliveryOutcome]) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(FnListener::new(f)))
    }

    /// Unregisters the listener behind `handle`. Returns whether one was
    /// removed.
    pub fn remove_listener(&self, handle: ListenerHandle) -> bool {
        self.listeners.remove(handle)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Effective configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Current worker counters.
    pub async fn stats(&self) -> DispatcherStats {
        self.stats.read().clone()
    }

    /// Stops accepting messages and waits for queued batches to finish.
    ///
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` if the queue does not drain within
    /// `shutdown_timeout`, or `WorkerPanic` if a worker panicked.
    pub async fn shutdown(&self) -> Result<()> {
        // Dropping the only sender closes the queue.
        drop(self.sender.write().take());

        let worker_pool = self.worker_pool.lock().take();
        match worker_pool {
            Some(pool) => {
                info!("shutting down peripheral event dispatcher");
                pool.shutdown_graceful(self.config.shutdown_timeout).await
            },
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .field("closed", &self.sender.read().is_none())
            .finish()
    }
}
