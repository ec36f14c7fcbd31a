//! Sink implementations
//!
//! Contains LogSink, JsonlFileSink, and MemorySink.

mod file;
mod log;
mod memory;

pub use self::file::JsonlFileSink;
pub use self::log::LogSink;
pub use self::memory::MemorySink;
