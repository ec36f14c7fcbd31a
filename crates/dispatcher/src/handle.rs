//! DispatcherHandle - owns the dispatch worker task and its bounded queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{BatchSink, DispatchConfig, FusionBatch};

use crate::dispatcher::SinkDispatcher;
use crate::metrics::DispatchMetrics;

/// Handle to a running dispatch worker.
///
/// The scheduler hands batches over with [`try_send`](Self::try_send); a full
/// queue drops the batch rather than stalling window emission.
pub struct DispatcherHandle {
    name: String,
    tx: mpsc::Sender<FusionBatch>,
    metrics: Arc<DispatchMetrics>,
    worker_handle: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Spawn a worker task wrapping `sink` with the given dispatch policy.
    pub fn spawn<S: BatchSink + Send + 'static>(sink: S, config: DispatchConfig) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(config.queue_capacity);

        let dispatcher = SinkDispatcher::new(sink, config);
        let metrics = dispatcher.metrics();

        let worker_name = name.clone();
        let worker_handle = tokio::spawn(async move {
            dispatch_worker(dispatcher, rx, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Sink name this handle forwards to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared metrics for this worker.
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Hand a batch to the worker without blocking.
    ///
    /// Returns false when the queue is full or the worker is gone; the batch
    /// is dropped and counted either way.
    pub fn try_send(&self, batch: FusionBatch) -> bool {
        match self.tx.try_send(batch) {
            Ok(()) => {
                self.metrics.set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(b)) => {
                self.metrics.inc_queue_dropped();
                warn!(
                    sink = %self.name,
                    window_id = b.window_id,
                    "Dispatch queue full, batch dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Dispatch worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the worker gracefully, letting it drain queue and spool.
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Dispatch worker panicked");
        }
        debug!(sink = %self.name, "Dispatcher shutdown complete");
    }
}

/// Worker loop: consume batches and dispatch them, absorbing sink failures.
#[instrument(
    name = "dispatch_worker_loop",
    skip(dispatcher, rx),
    fields(sink = %name)
)]
async fn dispatch_worker<S: BatchSink>(
    mut dispatcher: SinkDispatcher<S>,
    mut rx: mpsc::Receiver<FusionBatch>,
    name: String,
) {
    debug!(sink = %name, "Dispatch worker started");

    while let Some(batch) = rx.recv().await {
        dispatcher.metrics().set_queue_len(rx.len());
        let result = dispatcher.dispatch(batch).await;
        if !result.is_delivered() {
            debug!(sink = %name, ?result, "Batch not delivered");
        }
    }

    match dispatcher.shutdown().await {
        Ok(0) => {}
        Ok(undelivered) => {
            warn!(sink = %name, undelivered, "Shutdown with undelivered batches in spool");
        }
        Err(e) => {
            error!(sink = %name, error = %e, "Sink cleanup failed on shutdown");
        }
    }

    debug!(sink = %name, "Dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{millis, BatchMeta, PipelineError, RetryConfig};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    struct MockSink {
        name: String,
        write_count: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl BatchSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _batch: &FusionBatch) -> Result<(), PipelineError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(PipelineError::sink_write(&self.name, "mock failure"));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), PipelineError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    fn batch(window_id: u64) -> FusionBatch {
        FusionBatch {
            window_id,
            window_start: 0,
            window_end: millis(100),
            emit_timestamp: millis(100),
            slots: HashMap::new(),
            completeness: 1.0,
            meta: BatchMeta::default(),
        }
    }

    fn config(queue_capacity: usize) -> DispatchConfig {
        DispatchConfig {
            retry: RetryConfig {
                max_attempts: 1,
                initial_backoff: millis(1),
                max_backoff: millis(1),
                multiplier: 2.0,
            },
            spool_capacity: 8,
            queue_capacity,
        }
    }

    #[tokio::test]
    async fn test_handle_delivers_all_queued_batches() {
        let write_count = Arc::new(AtomicU64::new(0));
        let sink = MockSink {
            name: "test".to_string(),
            write_count: Arc::clone(&write_count),
            should_fail: false,
            delay_ms: 0,
        };

        let handle = DispatcherHandle::spawn(sink, config(10));
        for i in 0..5 {
            assert!(handle.try_send(batch(i)));
        }

        handle.shutdown().await;
        assert_eq!(write_count.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_handle_drops_when_queue_full() {
        let sink = MockSink {
            name: "slow".to_string(),
            write_count: Arc::new(AtomicU64::new(0)),
            should_fail: false,
            delay_ms: 100,
        };

        let handle = DispatcherHandle::spawn(sink, config(2));
        for i in 0..10 {
            handle.try_send(batch(i));
        }

        assert!(handle.metrics().queue_dropped() > 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_handle_failure_spools_instead_of_crashing() {
        let sink = MockSink {
            name: "failing".to_string(),
            write_count: Arc::new(AtomicU64::new(0)),
            should_fail: true,
            delay_ms: 0,
        };

        let handle = DispatcherHandle::spawn(sink, config(10));
        let metrics = Arc::clone(handle.metrics());
        for i in 0..3 {
            handle.try_send(batch(i));
        }

        sleep(Duration::from_millis(50)).await;
        assert!(metrics.write_failures() > 0);

        handle.shutdown().await;
    }
}
