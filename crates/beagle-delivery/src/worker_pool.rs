//! Worker pool draining the dispatch queue.
//!
//! A fixed number of worker tasks share the receiving end of the bounded
//! queue. Each worker processes one batch at a time, which caps concurrent
//! outbound HTTP work at the worker count.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use parking_lot::RwLock;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{panic_message, DeliveryError, Result},
    worker::{Batch, BatchProcessor, DispatcherStats},
};

/// Supervised set of dispatch workers.
pub(crate) struct WorkerPool {
    receiver: Arc<Mutex<mpsc::Receiver<Batch>>>,
    processor: Arc<BatchProcessor>,
    worker_count: usize,
    stats: Arc<RwLock<DispatcherStats>>,
    cancellation_token: CancellationToken,
    worker_handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(
        receiver: mpsc::Receiver<Batch>,
        processor: Arc<BatchProcessor>,
        worker_count: usize,
        stats: Arc<RwLock<DispatcherStats>>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            processor,
            worker_count,
            stats,
            cancellation_token,
            worker_handles: Vec::new(),
        }
    }

    /// Spawns the configured workers. Must run inside a tokio runtime.
    pub(crate) fn spawn_workers(&mut self) {
        info!(worker_count = self.worker_count, "spawning dispatch workers");

        for worker_id in 0..self.worker_count {
            let receiver = self.receiver.clone();
            let processor = self.processor.clone();
            let stats = self.stats.clone();
            let token = self.cancellation_token.clone();

            let handle = tokio::spawn(async move {
                let _active = ActiveWorker::enter(worker_id, stats);
                run_worker(worker_id, receiver, processor, token).await;
            });

            self.worker_handles.push(handle);
        }
    }

    /// Waits for workers to drain the closed queue.
    ///
    /// The caller must have dropped every queue sender first, otherwise
    /// workers keep waiting for messages until `timeout` elapses. On timeout
    /// the remaining workers are cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` if draining takes longer than `timeout`, or
    /// `WorkerPanic` if a worker panicked.
    pub(crate) async fn shutdown_graceful(mut self, timeout: Duration) -> Result<()> {
        info!(
            worker_count = self.worker_handles.len(),
            timeout_ms = timeout.as_millis(),
            "draining dispatch workers"
        );

        let handles = std::mem::take(&mut self.worker_handles);
        let drain = async {
            let mut first_panic = None;

            for (worker_id, handle) in handles.into_iter().enumerate() {
                if let Err(join_error) = handle.await {
                    error!(worker_id, error = %join_error, "dispatch worker panicked");
                    first_panic.get_or_insert(DeliveryError::WorkerPanic {
                        worker_id,
                        error: join_error.to_string(),
                    });
                }
            }

            first_panic.map_or(Ok(()), Err)
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(result) => {
                info!("dispatch workers drained");
                result
            },
            Err(_elapsed) => {
                error!(
                    timeout_ms = timeout.as_millis(),
                    "dispatch workers did not drain in time, cancelling"
                );
                self.cancellation_token.cancel();
                Err(DeliveryError::ShutdownTimeout { timeout })
            },
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let active = self.worker_handles.iter().filter(|h| !h.is_finished()).count();

        if active > 0 && !self.cancellation_token.is_cancelled() {
            warn!(active_workers = active, "worker pool dropped without shutdown, cancelling");
            self.cancellation_token.cancel();
        }
    }
}

/// Counts a worker as active for as long as it is alive, unwinding included.
struct ActiveWorker {
    worker_id: usize,
    stats: Arc<RwLock<DispatcherStats>>,
}

impl ActiveWorker {
    fn enter(worker_id: usize, stats: Arc<RwLock<DispatcherStats>>) -> Self {
        stats.write().active_workers += 1;
        debug!(worker_id, "dispatch worker starting");
        Self { worker_id, stats }
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.stats.write().active_workers -= 1;
        debug!(worker_id = self.worker_id, "dispatch worker stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Batch>>>,
    processor: Arc<BatchProcessor>,
    token: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = token.cancelled() => break,
            batch = async { receiver.lock().await.recv().await } => batch,
        };

        // None: queue closed and drained.
        let Some(batch) = next else { break };

        tokio::select! {
            biased;
            () = token.cancelled() => {
                warn!(worker_id, "batch abandoned on cancellation");
                break;
            },
            result = AssertUnwindSafe(processor.process(batch)).catch_unwind() => {
                if let Err(payload) = result {
                    error!(
                        worker_id,
                        panic = %panic_message(payload.as_ref()),
                        "batch processing panicked, batch dropped"
                    );
                }
            },
        }
    }
}
