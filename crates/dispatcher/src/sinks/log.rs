//! LogSink - logs batch summary via tracing

use contracts::{BatchSink, FusionBatch, PipelineError};
use tracing::{info, instrument};

/// Sink that logs batch summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch_summary(&self, batch: &FusionBatch) {
        let present = batch.present_count();
        let missing = batch.missing_sensors().count();

        info!(
            sink = %self.name,
            window_id = batch.window_id,
            window_start = batch.window_start,
            completeness = batch.completeness,
            present,
            missing,
            timed_out = batch.meta.timed_out,
            "FusionBatch received"
        );
    }
}

impl BatchSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, batch),
        fields(sink = %self.name, window_id = batch.window_id)
    )]
    async fn write(&mut self, batch: &FusionBatch) -> Result<(), PipelineError> {
        self.log_batch_summary(batch);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), PipelineError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), PipelineError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
