//! SinkDispatcher - retry, backoff and spooling around a single sink.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use contracts::{BatchSink, DispatchConfig, FusionBatch, PipelineError};

use crate::metrics::DispatchMetrics;
use crate::spool::Spool;

/// Outcome of dispatching one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    /// The sink accepted the batch on attempt `attempts` (1-based)
    Delivered { attempts: u32 },
    /// All attempts failed; the batch is parked in the spool (sink unavailable)
    Spooled,
    /// All attempts failed and the spool is full; the batch is lost and counted
    Dropped,
}

impl DispatchResult {
    /// Whether the batch reached the sink.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Forwards batches to a sink, absorbing failures without blocking upstream.
///
/// Spooled batches are replayed oldest-first before any newer batch, so the
/// sink observes strictly increasing window ids even across outages.
pub struct SinkDispatcher<S: BatchSink> {
    sink: S,
    config: DispatchConfig,
    spool: Spool,
    metrics: Arc<DispatchMetrics>,
}

impl<S: BatchSink> SinkDispatcher<S> {
    /// Wrap a sink with the given retry/spool policy.
    pub fn new(sink: S, config: DispatchConfig) -> Self {
        let spool = Spool::new(config.spool_capacity);
        Self {
            sink,
            config,
            spool,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    /// Shared metrics handle.
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of batches currently spooled.
    pub fn spool_len(&self) -> usize {
        self.spool.len()
    }

    /// Dispatch one batch.
    ///
    /// Never blocks beyond the bounded retry backoff; a stalled sink degrades
    /// to spool-and-continue, surfaced in the returned [`DispatchResult`].
    #[instrument(
        name = "dispatch_batch",
        skip(self, batch),
        fields(sink = self.sink.name(), window_id = batch.window_id)
    )]
    pub async fn dispatch(&mut self, batch: FusionBatch) -> DispatchResult {
        self.drain_spool().await;

        // While older batches are still parked, the new one must queue behind
        // them to preserve window order.
        if !self.spool.is_empty() {
            return self.park(batch);
        }

        match self.write_with_retry(&batch).await {
            Ok(attempts) => {
                self.metrics.inc_delivered();
                metrics::counter!("dispatch_batches_total", "status" => "delivered").increment(1);
                DispatchResult::Delivered { attempts }
            }
            Err(err) => {
                warn!(error = %err, "sink unavailable, spooling batch");
                self.park(batch)
            }
        }
    }

    /// Attempt to flush the spool, oldest first, one write attempt per batch.
    pub async fn drain_spool(&mut self) {
        while let Some(front) = self.spool.front() {
            match self.sink.write(front).await {
                Ok(()) => {
                    if let Some(batch) = self.spool.pop() {
                        debug!(window_id = batch.window_id, "spooled batch flushed");
                    }
                    self.metrics.inc_delivered();
                    metrics::counter!("dispatch_batches_total", "status" => "flushed")
                        .increment(1);
                }
                Err(_) => {
                    self.metrics.inc_write_failures();
                    break;
                }
            }
        }
        metrics::gauge!("dispatch_spool_depth").set(self.spool.len() as f64);
    }

    /// Flush, close the sink, and report how many batches stay undelivered.
    pub async fn shutdown(mut self) -> Result<usize, PipelineError> {
        self.drain_spool().await;
        let undelivered = self.spool.len();
        self.sink.flush().await?;
        self.sink.close().await?;
        Ok(undelivered)
    }

    fn park(&mut self, batch: FusionBatch) -> DispatchResult {
        let window_id = batch.window_id;
        if self.spool.push(batch) {
            self.metrics.inc_spooled();
            metrics::counter!("dispatch_batches_total", "status" => "spooled").increment(1);
            metrics::gauge!("dispatch_spool_depth").set(self.spool.len() as f64);
            DispatchResult::Spooled
        } else {
            self.metrics.inc_spool_dropped();
            metrics::counter!("dispatch_batches_total", "status" => "dropped").increment(1);
            warn!(window_id, "spool full, batch dropped");
            DispatchResult::Dropped
        }
    }

    async fn write_with_retry(&mut self, batch: &FusionBatch) -> Result<u32, PipelineError> {
        let retry = &self.config.retry;
        let mut last_err = None;

        for attempt in 1..=retry.max_attempts {
            match self.sink.write(batch).await {
                Ok(()) => return Ok(attempt),
                Err(err) => {
                    self.metrics.inc_write_failures();
                    metrics::counter!("dispatch_write_failures_total").increment(1);
                    debug!(
                        attempt,
                        max_attempts = retry.max_attempts,
                        error = %err,
                        "sink write failed"
                    );
                    last_err = Some(err);
                    if attempt < retry.max_attempts {
                        let backoff = retry.backoff_for_attempt(attempt);
                        sleep(Duration::from_nanos(backoff as u64)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            PipelineError::sink_write(self.sink.name(), "no attempts made")
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{millis, BatchMeta, RetryConfig};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Sink that fails the first `fail_first` writes, then succeeds.
    struct FlakySink {
        fail_first: u32,
        calls: Arc<AtomicU32>,
        accepted: Vec<u64>,
    }

    impl FlakySink {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                calls: Arc::new(AtomicU32::new(0)),
                accepted: Vec::new(),
            }
        }
    }

    impl BatchSink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn write(&mut self, batch: &FusionBatch) -> Result<(), PipelineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                return Err(PipelineError::sink_write("flaky", "injected failure"));
            }
            self.accepted.push(batch.window_id);
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

    fn fast_config(max_attempts: u32, spool_capacity: usize) -> DispatchConfig {
        DispatchConfig {
            retry: RetryConfig {
                max_attempts,
                initial_backoff: millis(1),
                max_backoff: millis(2),
                multiplier: 2.0,
            },
            spool_capacity,
            queue_capacity: 8,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_fourth_attempt_within_budget() {
        let sink = FlakySink::new(3);
        let mut dispatcher = SinkDispatcher::new(sink, fast_config(4, 8));

        let result = dispatcher.dispatch(batch(1)).await;
        assert_eq!(result, DispatchResult::Delivered { attempts: 4 });
        assert_eq!(dispatcher.metrics().delivered(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spools_when_attempts_exhausted() {
        let sink = FlakySink::new(3);
        let mut dispatcher = SinkDispatcher::new(sink, fast_config(3, 8));

        let result = dispatcher.dispatch(batch(1)).await;
        assert_eq!(result, DispatchResult::Spooled);
        assert_eq!(dispatcher.spool_len(), 1);
        assert_eq!(dispatcher.metrics().spooled(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spool_drains_in_order_when_sink_recovers() {
        // Fails long enough to spool batches 1 and 2, then recovers.
        let sink = FlakySink::new(4);
        let mut dispatcher = SinkDispatcher::new(sink, fast_config(2, 8));

        assert_eq!(dispatcher.dispatch(batch(1)).await, DispatchResult::Spooled);
        assert_eq!(dispatcher.dispatch(batch(2)).await, DispatchResult::Spooled);

        // Sink is healthy again: spool flushes first, then the new batch.
        let result = dispatcher.dispatch(batch(3)).await;
        assert!(result.is_delivered());
        assert_eq!(dispatcher.spool_len(), 0);
        assert_eq!(dispatcher.sink.accepted, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_spool_drops_new_batches() {
        let sink = FlakySink::new(u32::MAX);
        let mut dispatcher = SinkDispatcher::new(sink, fast_config(1, 2));

        assert_eq!(dispatcher.dispatch(batch(1)).await, DispatchResult::Spooled);
        assert_eq!(dispatcher.dispatch(batch(2)).await, DispatchResult::Spooled);
        assert_eq!(dispatcher.dispatch(batch(3)).await, DispatchResult::Dropped);
        assert_eq!(dispatcher.metrics().spool_dropped(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reports_undelivered() {
        let sink = FlakySink::new(u32::MAX);
        let mut dispatcher = SinkDispatcher::new(sink, fast_config(1, 8));

        dispatcher.dispatch(batch(1)).await;
        dispatcher.dispatch(batch(2)).await;

        let undelivered = dispatcher.shutdown().await.unwrap();
        assert_eq!(undelivered, 2);
    }
}
