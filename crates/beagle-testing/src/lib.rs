//! Test infrastructure for deterministic dispatch testing.
//!
//! Provides a recording transport, a collecting listener and fixture
//! builders. Nothing here opens sockets; HTTP-level tests use wiremock
//! directly.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod events;
pub mod fixtures;
pub mod transport;

pub use beagle_core::{Clock, TestClock};
pub use events::{CollectingListener, DEFAULT_EVENT_TIMEOUT};
pub use fixtures::{generic, get_subscriber, ibeacon, post_subscriber, MessageBuilder};
pub use transport::{RecordedRequest, RecordingTransport};
