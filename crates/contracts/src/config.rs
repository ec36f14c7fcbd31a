//! Fusion and dispatch configuration shared across crates.
//!
//! These structs are consumed by the engine/dispatcher; loading them from
//! files or CLI flags is the embedding application's concern.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::{millis, Nanos, PipelineError, SensorId};

/// Fusion engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FusionConfig {
    /// The full sensor set a batch is expected to cover
    #[validate(length(min = 1))]
    pub expected_sensors: Vec<SensorId>,

    /// Window period on the alignment clock (fused output rate)
    #[serde(default = "default_period")]
    #[validate(range(min = 1))]
    pub period: Nanos,

    /// Maximum time a window stays open before closing with partial data
    #[serde(default = "default_max_wait")]
    #[validate(range(min = 1))]
    pub max_wait: Nanos,

    /// Clock normalizer configuration
    #[serde(default)]
    #[validate(nested)]
    pub clock: ClockConfig,

    /// Per-sensor ingest buffer configuration
    #[serde(default)]
    #[validate(nested)]
    pub buffer: BufferConfig,
}

fn default_period() -> Nanos {
    millis(100)
}

fn default_max_wait() -> Nanos {
    millis(150)
}

impl FusionConfig {
    /// Minimal config for the given sensor set, defaults elsewhere.
    pub fn for_sensors<I, S>(sensors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SensorId>,
    {
        Self {
            expected_sensors: sensors.into_iter().map(Into::into).collect(),
            period: default_period(),
            max_wait: default_max_wait(),
            clock: ClockConfig::default(),
            buffer: BufferConfig::default(),
        }
    }

    /// Validate ranges and cross-field constraints.
    pub fn validated(self) -> Result<Self, PipelineError> {
        self.validate().map_err(first_validation_error)?;
        if self.max_wait < self.period {
            return Err(PipelineError::config_validation(
                "max_wait",
                "must be >= period, otherwise every window times out early",
            ));
        }
        if self.buffer.max_reorder_tolerance >= self.buffer.max_age {
            return Err(PipelineError::config_validation(
                "buffer.max_reorder_tolerance",
                "must be < buffer.max_age",
            ));
        }
        Ok(self)
    }
}

/// Clock normalizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClockConfig {
    /// Exponential smoothing factor for the offset estimator
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub smoothing_alpha: f64,

    /// Per-reading bound on offset correction, to avoid overshoot
    #[validate(range(min = 1))]
    pub max_correction: Nanos,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.1,
            max_correction: millis(5),
        }
    }
}

/// Per-sensor ingest buffer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BufferConfig {
    /// Maximum readings held per sensor; oldest evicted first on overflow
    #[validate(range(min = 1))]
    pub max_size: usize,

    /// Reorder window: readings older than `max_seen - tolerance` are dropped
    #[validate(range(min = 1))]
    pub max_reorder_tolerance: Nanos,

    /// Maximum age relative to the alignment clock before eviction
    #[validate(range(min = 1))]
    pub max_age: Nanos,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_size: 1024,
            max_reorder_tolerance: millis(20),
            max_age: millis(1000),
        }
    }
}

/// Sink dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// Retry policy for sink writes
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Maximum batches held in the overflow spool
    #[serde(default = "default_spool_capacity")]
    #[validate(range(min = 1))]
    pub spool_capacity: usize,

    /// Dispatcher input queue capacity
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,
}

fn default_spool_capacity() -> usize {
    256
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            spool_capacity: default_spool_capacity(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl DispatchConfig {
    /// Validate ranges.
    pub fn validated(self) -> Result<Self, PipelineError> {
        self.validate().map_err(first_validation_error)?;
        Ok(self)
    }
}

/// Bounded exponential backoff policy.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RetryConfig {
    /// Total write attempts per batch (1 = no retry)
    #[validate(range(min = 1))]
    pub max_attempts: u32,

    /// Backoff before the first retry
    #[validate(range(min = 1))]
    pub initial_backoff: Nanos,

    /// Backoff cap
    #[validate(range(min = 1))]
    pub max_backoff: Nanos,

    /// Backoff growth factor between attempts
    #[validate(range(min = 1.0))]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: millis(10),
            max_backoff: millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (1-based), capped at `max_backoff`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Nanos {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let backoff = (self.initial_backoff as f64 * factor) as Nanos;
        backoff.min(self.max_backoff)
    }
}

fn first_validation_error(errors: ValidationErrors) -> PipelineError {
    let (field, kinds) = errors
        .errors()
        .iter()
        .next()
        .map(|(f, k)| (f.to_string(), format!("{k:?}")))
        .unwrap_or_else(|| ("<unknown>".to_string(), "invalid".to_string()));
    PipelineError::config_validation(field, kinds)
}
