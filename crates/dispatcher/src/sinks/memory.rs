//! MemorySink - collects batches in memory for tests and demos

use std::sync::{Arc, Mutex};

use contracts::{BatchSink, FusionBatch, PipelineError};

/// Sink that buffers every batch it receives.
///
/// Clone the handle from [`batches`](Self::batches) before moving the sink
/// into a worker to inspect output afterwards.
pub struct MemorySink {
    name: String,
    batches: Arc<Mutex<Vec<FusionBatch>>>,
    fail: bool,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batches: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Make subsequent writes fail, for exercising retry paths.
    pub fn set_fail(&mut self, fail: bool) {
        self.fail = fail;
    }

    /// Shared handle to the collected batches.
    pub fn batches(&self) -> Arc<Mutex<Vec<FusionBatch>>> {
        Arc::clone(&self.batches)
    }

    /// Number of batches collected so far.
    pub fn len(&self) -> usize {
        self.batches.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BatchSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, batch: &FusionBatch) -> Result<(), PipelineError> {
        if self.fail {
            return Err(PipelineError::sink_write(&self.name, "injected failure"));
        }
        self.batches
            .lock()
            .map_err(|_| PipelineError::sink_write(&self.name, "poisoned batch buffer"))?
            .push(batch.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}
