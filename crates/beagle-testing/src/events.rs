//! Listener doubles for deterministic async validation.
//!
//! Dispatch is fire-and-forget, so tests observe results through a
//! listener. All waits use bounded timeouts to prevent CI hangs.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use beagle_delivery::{DeliveryListener, DeliveryOutcome};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Default timeout for waiting on dispatched batches in tests.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Listener that stores every batch it receives.
///
/// Clones share storage, so one clone can be registered while another is
/// kept for assertions.
#[derive(Debug, Clone, Default)]
pub struct CollectingListener {
    batches: Arc<Mutex<Vec<Vec<DeliveryOutcome>>>>,
    notify: Arc<Notify>,
}

impl CollectingListener {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches received so far, in arrival order.
    pub fn batches(&self) -> Vec<Vec<DeliveryOutcome>> {
        self.batches.lock().clone()
    }

    /// All outcomes received so far, flattened.
    pub fn outcomes(&self) -> Vec<DeliveryOutcome> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Number of batches received.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Waits until at least `count` batches arrived.
    ///
    /// Panics after [`DEFAULT_EVENT_TIMEOUT`].
    pub async fn wait_for_batches(&self, count: usize) -> Vec<Vec<DeliveryOutcome>> {
        self.wait_for_batches_with_timeout(count, DEFAULT_EVENT_TIMEOUT).await
    }

    /// Waits until at least `count` batches arrived, with a custom timeout.
    pub async fn wait_for_batches_with_timeout(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Vec<Vec<DeliveryOutcome>> {
        let result = tokio::time::timeout(timeout, async {
            while self.batch_count() < count {
                tokio::select! {
                    () = self.notify.notified() => {},
                    () = tokio::time::sleep(Duration::from_millis(10)) => {},
                }
            }
        })
        .await;

        assert!(
            result.is_ok(),
            "listener did not receive batches in time. Expected: {}, Actual: {}, Timeout: {:?}",
            count,
            self.batch_count(),
            timeout
        );

        self.batches()
    }

    /// Asserts that no further batch arrives within `window`.
    pub async fn assert_quiet_for(&self, window: Duration) {
        let before = self.batch_count();
        tokio::time::sleep(window).await;
        assert_eq!(self.batch_count(), before, "unexpected batch received");
    }
}

#[async_trait]
impl DeliveryListener for CollectingListener {
    async fn on_batch(&self, outcomes: &[DeliveryOutcome]) {
        self.batches.lock().push(outcomes.to_vec());
        self.notify.notify_waiters();
    }
}
