//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-crate data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All timestamps are nanosecond integers ([`Nanos`])
//! - `device_timestamp` is the sensor-local clock, `arrival_timestamp` the
//!   pipeline monotonic clock; the fusion engine assigns `normalized_timestamp`
//! - `sequence` is strictly increasing per sensor and used to detect
//!   gaps/reordering at the source

mod batch;
mod config;
mod error;
mod reading;
mod sensor_id;
mod sink;
mod time;

pub use batch::*;
pub use config::*;
pub use error::*;
pub use reading::*;
pub use sensor_id::SensorId;
pub use sink::{BatchSink, LocalBatchSink};
pub use time::*;
