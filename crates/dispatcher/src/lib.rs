//! # Dispatcher
//!
//! Hands completed [`FusionBatch`]es to the external sink.
//!
//! Responsibilities:
//! - Retry failed sink writes with bounded exponential backoff
//! - Absorb sink outages in a bounded overflow spool, never blocking the
//!   fusion pipeline
//! - Isolate the sink behind a worker task with a non-blocking queue

pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod handle;
pub mod metrics;
pub mod sinks;
pub mod spool;

pub use contracts::{BatchSink, FusionBatch};
pub use dispatcher::{DispatchResult, SinkDispatcher};
pub use error::DispatcherError;
pub use factory::{spawn_sink, SinkKind, SinkSpec};
pub use handle::DispatcherHandle;
pub use metrics::{DispatchMetrics, DispatchSnapshot};
pub use sinks::{JsonlFileSink, LogSink, MemorySink};
pub use spool::Spool;
