//! JsonlFileSink - appends one JSON line per batch to a run-stamped file

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, error, instrument};

use contracts::{BatchSink, FusionBatch, PipelineError};

/// Sink that persists batches as newline-delimited JSON.
///
/// Each run writes to its own timestamped file under the base directory, so
/// restarts never clobber earlier output.
pub struct JsonlFileSink {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl JsonlFileSink {
    /// Create a sink writing to `<base_dir>/batches_<timestamp>.jsonl`.
    pub fn new(name: impl Into<String>, base_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = base_dir.join(format!("batches_{stamp}.jsonl"));
        Self::with_path(name, path)
    }

    /// Create a sink writing to an explicit file path.
    pub fn with_path(name: impl Into<String>, path: PathBuf) -> std::io::Result<Self> {
        let file = File::create(&path)?;
        Ok(Self {
            name: name.into(),
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn append_line(&mut self, batch: &FusionBatch) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, batch)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

impl BatchSink for JsonlFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "jsonl_sink_write",
        skip(self, batch),
        fields(sink = %self.name, window_id = batch.window_id)
    )]
    async fn write(&mut self, batch: &FusionBatch) -> Result<(), PipelineError> {
        self.append_line(batch).map_err(|e| {
            error!(sink = %self.name, window_id = batch.window_id, error = %e, "Write failed");
            PipelineError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "jsonl_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer
            .flush()
            .map_err(|e| PipelineError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "jsonl_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), PipelineError> {
        self.writer
            .flush()
            .map_err(|e| PipelineError::sink_write(&self.name, e.to_string()))?;
        debug!(sink = %self.name, path = %self.path.display(), lines = self.written, "JsonlFileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{millis, BatchMeta};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn batch(window_id: u64) -> FusionBatch {
        FusionBatch {
            window_id,
            window_start: millis(100),
            window_end: millis(200),
            emit_timestamp: millis(215),
            slots: HashMap::new(),
            completeness: 0.0,
            meta: BatchMeta::default(),
        }
    }

    #[tokio::test]
    async fn test_jsonl_sink_writes_one_line_per_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut sink = JsonlFileSink::with_path("test_file", path.clone()).unwrap();

        sink.write(&batch(1)).await.unwrap();
        sink.write(&batch(2)).await.unwrap();
        sink.close().await.unwrap();

        let contents = fs::read_to_string(path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: FusionBatch = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.window_id, 1);
    }

    #[tokio::test]
    async fn test_jsonl_sink_creates_base_dir() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("nested").join("output");

        let mut sink = JsonlFileSink::new("test_file", &base).unwrap();
        sink.write(&batch(7)).await.unwrap();
        sink.close().await.unwrap();

        assert!(base.exists());
        let entries: Vec<_> = fs::read_dir(&base).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
