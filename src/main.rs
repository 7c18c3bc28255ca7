//! Beagle proximity notification service.
//!
//! Main entry point. Wires the event broker, the activity directory, the
//! dispatcher and the inspection API, then coordinates graceful shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use beagle_activity::ActivityDirectory;
use beagle_api::{AppState, Config};
use beagle_core::{Clock, InMemoryEventBroker, SystemClock};
use beagle_delivery::{Dispatcher, Notifier};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.log_level)?;

    info!("Starting beagle notification service");
    info!(
        server_addr = %format!("{}:{}", config.host, config.port),
        worker_count = config.worker_count,
        queue_capacity = config.queue_capacity,
        targets = config.targets.len(),
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let broker = InMemoryEventBroker::new();

    let directory = Arc::new(ActivityDirectory::new(clock.clone())).use_broker(&broker);

    let dispatcher = Arc::new(
        Dispatcher::with_http_transport(config.to_dispatcher_config())
            .context("Failed to start dispatcher")?,
    );
    dispatcher.add_listener_fn(|outcomes| {
        for outcome in outcomes {
            match &outcome.error {
                None => info!(
                    event = %outcome.event,
                    target = %outcome.target_name,
                    subscriber = %outcome.subscriber.name,
                    "delivery succeeded"
                ),
                Some(e) => warn!(
                    event = %outcome.event,
                    target = %outcome.target_name,
                    subscriber = %outcome.subscriber.name,
                    error = %e,
                    "delivery failed"
                ),
            }
        }
    });

    let notifier = Arc::new(Notifier::new(dispatcher.clone(), config.targets.clone()));
    notifier.use_broker(&broker);

    let addr = config.parse_server_addr()?;
    let request_timeout = std::time::Duration::from_secs(config.request_timeout);
    let state = AppState::new(directory, clock);

    info!(addr = %addr, "beagle is ready, waiting for discovery events");

    if let Err(e) =
        beagle_api::start_server(state, addr, request_timeout, beagle_api::shutdown_signal()).await
    {
        error!(error = %e, "Server failed");
    }

    info!("Draining dispatch queue");
    if let Err(e) = dispatcher.shutdown().await {
        error!(error = %e, "Dispatcher did not shut down cleanly");
    }

    info!("beagle shutdown complete");
    Ok(())
}

/// Initializes tracing. `RUST_LOG` wins over the configured level.
fn init_tracing(default_level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}
