//! Beagle inspection API and service configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use beagle_activity::ActivityDirectory;
use beagle_core::Clock;

pub mod config;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use server::{create_router, shutdown_signal, start_server};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Directory of visible peripherals.
    pub directory: Arc<ActivityDirectory>,
    /// Time source for response timestamps.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates the handler state.
    pub fn new(directory: Arc<ActivityDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self { directory, clock }
    }
}
