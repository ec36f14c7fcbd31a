//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Input queue full - batch dropped before reaching the dispatcher
    #[error("dispatcher queue full, batch for window {window_id} dropped")]
    QueueFull { window_id: u64 },

    /// Sink or pipeline error (from contracts)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::PipelineError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
