//! Bounded overflow spool absorbing sink unavailability.

use std::collections::VecDeque;

use contracts::FusionBatch;

/// FIFO spool with a hard capacity.
///
/// Oldest batches stay at the front so draining preserves emission order.
/// Once the bound is reached, new batches are rejected and counted by the
/// caller; older batches are never displaced.
#[derive(Debug)]
pub struct Spool {
    queue: VecDeque<FusionBatch>,
    capacity: usize,
}

impl Spool {
    /// Create a spool holding at most `capacity` batches.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append a batch; returns false (batch dropped) when full.
    pub fn push(&mut self, batch: FusionBatch) -> bool {
        if self.queue.len() >= self.capacity {
            return false;
        }
        self.queue.push_back(batch);
        true
    }

    /// Oldest spooled batch, without removing it.
    pub fn front(&self) -> Option<&FusionBatch> {
        self.queue.front()
    }

    /// Remove and return the oldest spooled batch.
    pub fn pop(&mut self) -> Option<FusionBatch> {
        self.queue.pop_front()
    }

    /// Number of spooled batches.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the spool is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
