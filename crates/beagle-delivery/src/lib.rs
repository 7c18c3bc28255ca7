//! Webhook dispatch for peripheral events.
//!
//! Delivers `found`/`lost` notifications to subscriber endpoints and reports
//! per-subscriber outcomes to in-process listeners.
//!
//! # Architecture
//!
//! `Dispatcher::send` validates the event name and enqueues the message on a
//! bounded queue. A fixed pool of workers drains the queue; each worker
//! handles one batch at a time:
//!
//! 1. **Serialize** - peripheral to flat string fields
//! 2. **Build** - JSON body for `POST`, query string otherwise
//! 3. **Send** - one transport call per subscriber, in list order
//! 4. **Emit** - the full outcome list goes to every listener
//!
//! No delivery is retried. Call rejections come back from `send`; every other
//! failure is recorded in a `DeliveryOutcome`.
//!
//! # Example
//!
//! ```no_run
//! use beagle_delivery::{DeliveryError, Dispatcher, DispatcherConfig};
//!
//! # async fn example() -> std::result::Result<(), DeliveryError> {
//! let dispatcher = Dispatcher::with_http_transport(DispatcherConfig::default())?;
//!
//! dispatcher.add_listener_fn(|outcomes| {
//!     for outcome in outcomes {
//!         println!("{} delivered: {}", outcome.subscriber.name, outcome.delivered);
//!     }
//! });
//!
//! dispatcher.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod notifier;
pub mod request;
mod worker;
mod worker_pool;

pub use client::{ClientConfig, HttpTransport, Transport};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{DeliveryError, ErrorCategory, Result};
pub use listener::{
    DeliveryListener, DeliveryOutcome, FnListener, ListenerHandle, ListenerRegistry,
};
pub use notifier::{Notifier, Target};
pub use worker::DispatcherStats;

/// Default number of concurrent dispatch workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default number of messages that may wait for a worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
