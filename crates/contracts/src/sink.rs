//! BatchSink trait - dispatcher output interface.

use crate::{FusionBatch, PipelineError};

/// Batch output trait.
///
/// The dispatcher treats any non-success as a full failure and retries the
/// whole batch; sinks must not report partial writes as success.
#[trait_variant::make(BatchSink: Send)]
pub trait LocalBatchSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one fusion batch
    ///
    /// # Errors
    /// Returns a write error with context; the batch may be retried verbatim.
    async fn write(&mut self, batch: &FusionBatch) -> Result<(), PipelineError>;

    /// Flush buffered output (if any)
    async fn flush(&mut self) -> Result<(), PipelineError>;

    /// Close the sink
    async fn close(&mut self) -> Result<(), PipelineError>;
}
