//! Batch delivery: one message, every subscriber, in order.

use std::{panic::AssertUnwindSafe, sync::Arc};

use beagle_core::{Clock, Message, PayloadFields, PeripheralEvent, Subscriber};
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    client::Transport,
    error::{DeliveryError, ErrorCategory, Result},
    listener::{DeliveryOutcome, ListenerRegistry},
    request::{build_request, serialize_peripheral},
};

/// Counters maintained by the dispatch workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Number of running worker tasks.
    pub active_workers: usize,
    /// Batches fully processed, listeners included.
    pub batches_processed: u64,
    /// Outcomes with `delivered == true`.
    pub successful_deliveries: u64,
    /// Outcomes with `delivered == false`.
    pub failed_deliveries: u64,
}

/// A message that passed validation and waits in the queue.
#[derive(Debug, Clone)]
pub(crate) struct Batch {
    pub(crate) event: PeripheralEvent,
    pub(crate) message: Message,
}

/// Delivers batches and reports their outcomes.
#[derive(Debug)]
pub(crate) struct BatchProcessor {
    transport: Arc<dyn Transport>,
    listeners: Arc<ListenerRegistry>,
    clock: Arc<dyn Clock>,
    stats: Arc<RwLock<DispatcherStats>>,
}

impl BatchProcessor {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        listeners: Arc<ListenerRegistry>,
        clock: Arc<dyn Clock>,
        stats: Arc<RwLock<DispatcherStats>>,
    ) -> Self {
        Self { transport, listeners, clock, stats }
    }

    /// Delivers to every subscriber sequentially, then emits the outcomes.
    pub(crate) async fn process(&self, batch: Batch) -> Vec<DeliveryOutcome> {
        let Batch { event, message } = batch;
        let span = info_span!(
            "dispatch_batch",
            batch_id = %Uuid::new_v4(),
            event = %event,
            target = %message.target_name,
            subscribers = message.subscribers.len(),
        );

        async move {
            let mut outcomes = Vec::with_capacity(message.subscribers.len());

            for subscriber in &message.subscribers {
                let result = self.deliver_single(&message, subscriber).await;

                match &result {
                    Ok(()) => info!(
                        subscriber = %subscriber.name,
                        "notified subscriber for peripheral"
                    ),
                    Err(e) => warn!(
                        subscriber = %subscriber.name,
                        category = %ErrorCategory::from(e),
                        error = %e,
                        "failed to notify subscriber for peripheral"
                    ),
                }

                outcomes.push(DeliveryOutcome::from_result(
                    event,
                    self.clock.now(),
                    message.target_name.clone(),
                    subscriber.clone(),
                    result,
                ));
            }

            self.record(&outcomes);
            self.listeners.emit(&outcomes).await;

            outcomes
        }
        .instrument(span)
        .await
    }

    /// Serializes, builds and sends one subscriber's request.
    async fn deliver_single(&self, message: &Message, subscriber: &Subscriber) -> Result<()> {
        let fields: PayloadFields =
            serialize_peripheral(&message.target_name, message.peripheral.as_deref())
                .inspect_err(|e| error!(error = %e, "failed to serialize peripheral"))?;

        let Some(endpoint) = &subscriber.endpoint else {
            warn!(subscriber = %subscriber.name, "subscriber has no endpoint");
            return Ok(());
        };

        let request = build_request(endpoint, &fields).inspect_err(|e| {
            error!(endpoint = %endpoint.name, error = %e, "failed to create a request");
        })?;

        debug!(endpoint = %endpoint.name, method = %request.method(), "calling endpoint");

        let sent = AssertUnwindSafe(self.transport.send(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(DeliveryError::transport_panic(payload.as_ref())));

        sent.inspect_err(|e| {
            error!(
                endpoint = %endpoint.name,
                url = %endpoint.url,
                error = %e,
                "failed to reach out the endpoint"
            );
        })
    }

    fn record(&self, outcomes: &[DeliveryOutcome]) {
        let delivered = outcomes.iter().filter(|o| o.delivered).count() as u64;

        let mut stats = self.stats.write();
        stats.batches_processed += 1;
        stats.successful_deliveries += delivered;
        stats.failed_deliveries += outcomes.len() as u64 - delivered;
    }
}
