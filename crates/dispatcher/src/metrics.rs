//! Dispatch metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared counters for one dispatcher.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Current input queue length
    queue_len: AtomicUsize,
    /// Batches delivered to the sink
    delivered: AtomicU64,
    /// Individual write attempts that failed
    write_failures: AtomicU64,
    /// Batches parked in the spool after exhausting retries
    spooled: AtomicU64,
    /// Batches dropped because the spool was full
    spool_dropped: AtomicU64,
    /// Batches dropped because the input queue was full
    queue_dropped: AtomicU64,
}

impl DispatchMetrics {
    /// Create a fresh metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn inc_write_failures(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn spooled(&self) -> u64 {
        self.spooled.load(Ordering::Relaxed)
    }

    pub fn inc_spooled(&self) {
        self.spooled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn spool_dropped(&self) -> u64 {
        self.spool_dropped.load(Ordering::Relaxed)
    }

    pub fn inc_spool_dropped(&self) {
        self.spool_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queue_dropped(&self) -> u64 {
        self.queue_dropped.load(Ordering::Relaxed)
    }

    pub fn inc_queue_dropped(&self) {
        self.queue_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters.
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            queue_len: self.queue_len(),
            delivered: self.delivered(),
            write_failures: self.write_failures(),
            spooled: self.spooled(),
            spool_dropped: self.spool_dropped(),
            queue_dropped: self.queue_dropped(),
        }
    }
}

/// Point-in-time view of [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchSnapshot {
    pub queue_len: usize,
    pub delivered: u64,
    pub write_failures: u64,
    pub spooled: u64,
    pub spool_dropped: u64,
    pub queue_dropped: u64,
}
