//! Sink factory - builds dispatch workers from declarative sink specs

use std::path::PathBuf;

use tracing::instrument;

use contracts::DispatchConfig;

use crate::error::DispatcherError;
use crate::handle::DispatcherHandle;
use crate::sinks::{JsonlFileSink, LogSink};

/// Which sink implementation to build
#[derive(Debug, Clone)]
pub enum SinkKind {
    /// Log batch summaries via tracing
    Log,
    /// Append batches as JSON lines under a base directory
    JsonlFile { base_dir: PathBuf },
}

/// Declarative description of one sink
#[derive(Debug, Clone)]
pub struct SinkSpec {
    pub name: String,
    pub kind: SinkKind,
}

impl SinkSpec {
    pub fn log(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SinkKind::Log,
        }
    }

    pub fn jsonl_file(name: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: SinkKind::JsonlFile {
                base_dir: base_dir.into(),
            },
        }
    }
}

/// Build the sink described by `spec` and spawn its dispatch worker.
#[instrument(
    name = "spawn_sink",
    skip(spec, config),
    fields(sink = %spec.name, kind = ?spec.kind)
)]
pub fn spawn_sink(
    spec: &SinkSpec,
    config: DispatchConfig,
) -> Result<DispatcherHandle, DispatcherError> {
    match &spec.kind {
        SinkKind::Log => {
            let sink = LogSink::new(&spec.name);
            Ok(DispatcherHandle::spawn(sink, config))
        }
        SinkKind::JsonlFile { base_dir } => {
            let sink = JsonlFileSink::new(&spec.name, base_dir)
                .map_err(|e| DispatcherError::sink_creation(&spec.name, e.to_string()))?;
            Ok(DispatcherHandle::spawn(sink, config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_spawn_log_sink() {
        let handle = spawn_sink(&SinkSpec::log("console"), DispatchConfig::default()).unwrap();
        assert_eq!(handle.name(), "console");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_spawn_jsonl_sink_creates_output_dir() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("batches");
        let spec = SinkSpec::jsonl_file("file", &base);

        let handle = spawn_sink(&spec, DispatchConfig::default()).unwrap();
        handle.shutdown().await;

        assert!(base.exists());
    }
}
