//! # Fusion Engine
//!
//! Time synchronization and buffered fusion core.
//!
//! Responsibilities:
//! - Clock normalization onto the shared monotonic time base (per-sensor
//!   offset + drift tracking, regression detection)
//! - Bounded, time-ordered per-sensor ingest buffers with watermarks
//! - Fixed-period synchronization windows with a bounded-latency close policy
//! - Assembly of time-aligned [`FusionBatch`]es with explicit missing markers
//!
//! ## Usage
//!
//! ```ignore
//! use contracts::FusionConfig;
//! use fusion_engine::FusionEngine;
//!
//! let config = FusionConfig::for_sensors(["cam", "lidar", "imu"]).validated()?;
//! let mut engine = FusionEngine::new(config);
//!
//! // Producers push readings as they arrive
//! engine.ingest(raw_reading)?;
//!
//! // The scheduler task polls on arrival and on window deadlines
//! for batch in engine.poll(now) {
//!     // forward to the dispatcher
//! }
//! ```

mod assembler;
mod buffer;
mod clock;
mod engine;
mod scheduler;

pub use assembler::assemble;
pub use buffer::{IngestBuffer, PushOutcome};
pub use clock::{AlignmentClock, ClockNormalizer, SensorClockState};
pub use engine::{EngineStats, FusionEngine};
pub use scheduler::{SyncWindow, WindowScheduler, WindowState};

// Re-export contract types used at the API boundary
pub use contracts::{FusionBatch, FusionConfig, RawReading, Reading};
