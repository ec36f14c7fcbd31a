//! # Pipeline
//!
//! End-to-end wiring: mock sensor sources feeding the fusion engine, with
//! emitted batches fanned out to dispatcher-managed sinks.
//!
//! ## Usage
//!
//! ```ignore
//! use contracts::FusionConfig;
//! use pipeline::{FusionPipeline, MockSensorSource, PipelineConfig};
//!
//! let mut config = PipelineConfig::new(FusionConfig::for_sensors(["cam", "imu"]));
//! config.max_batches = Some(50);
//!
//! let mut pipeline = FusionPipeline::new(config);
//! pipeline.add_source(MockSensorSource::camera("cam", 20.0, 800, 600));
//! pipeline.add_source(MockSensorSource::imu("imu", 100.0));
//!
//! let stats = pipeline.run().await?;
//! stats.print_summary();
//! ```

pub mod clock;
pub mod mock;
pub mod runner;
pub mod stats;

pub use clock::MonotonicClock;
pub use mock::{MockSensorConfig, MockSensorSource};
pub use runner::{FusionPipeline, PipelineConfig};
pub use stats::PipelineStats;
