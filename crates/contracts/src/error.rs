//! Layered error definitions
//!
//! Categorized by source: clock / buffer / sink / config / io. Per-sensor
//! failures are typed results consumed by the caller; none of them abort the
//! pipeline.

use thiserror::Error;

use crate::{Nanos, SensorId};

/// Unified error type
#[derive(Debug, Error)]
pub enum PipelineError {
    // ===== Clock Errors =====
    /// The normalized timestamp would move backwards for this sensor.
    ///
    /// Indicates an unrecoverable device clock jump; the sensor is excluded
    /// from future windows until a fresh bootstrap reading arrives.
    #[error(
        "clock regression for sensor '{sensor_id}': \
         normalized {attempted}ns < last {last_normalized}ns"
    )]
    ClockRegression {
        sensor_id: SensorId,
        last_normalized: Nanos,
        attempted: Nanos,
    },

    // ===== Buffer Errors =====
    /// Reading arrived beyond the reorder tolerance and was discarded.
    #[error(
        "late reading dropped for sensor '{sensor_id}': \
         timestamp {timestamp}ns behind watermark {watermark}ns"
    )]
    LateDrop {
        sensor_id: SensorId,
        timestamp: Nanos,
        watermark: Nanos,
    },

    // ===== Configuration Errors =====
    /// Configuration field failed validation
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink kept failing and the batch went to the overflow spool
    #[error("sink unavailable after {attempts} attempts, {spooled} batches spooled")]
    SinkUnavailable { attempts: u32, spooled: usize },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create a config validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error is scoped to a single sensor stream
    pub fn is_per_sensor(&self) -> bool {
        matches!(self, Self::ClockRegression { .. } | Self::LateDrop { .. })
    }
}
