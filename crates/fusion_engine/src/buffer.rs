//! Per-sensor ingest buffer with timestamp-ordered storage and a watermark.
//!
//! Uses index-based separation for better performance:
//! - a sorted `VecDeque` holds lightweight metadata (timestamp + slab key)
//! - a `Slab` holds the actual Readings
//!
//! Ordering operations therefore move 24-byte metadata entries, never image
//! or point-cloud payloads.

use std::collections::VecDeque;
use std::fmt;

use contracts::{BufferConfig, Nanos, Reading};
use slab::Slab;

/// Lightweight metadata kept in sorted order.
#[derive(Debug, Clone, Copy)]
struct ReadingMeta {
    /// Normalized timestamp, primary sort key
    timestamp: Nanos,
    /// Source sequence number, secondary sort key
    sequence: u64,
    /// Key into the slab storage
    slab_key: usize,
}

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Inserted in timestamp order
    Stored,
    /// Older than the watermark, discarded and counted
    LateDropped,
}

/// Bounded, time-ordered holding buffer for one sensor.
///
/// Invariants:
/// - the index is sorted ascending by `(timestamp, sequence)`
/// - size never exceeds `max_size`; oldest entries are evicted first
/// - nothing behind the watermark is ever inserted
pub struct IngestBuffer {
    sensor_label: String,
    index: VecDeque<ReadingMeta>,
    storage: Slab<Reading>,
    max_size: usize,
    max_reorder_tolerance: Nanos,
    /// Highest normalized timestamp ever pushed
    max_seen: Option<Nanos>,
    /// Highest sequence number ever pushed
    last_sequence: Option<u64>,
    late_drops: u64,
    overflows: u64,
    out_of_order: u64,
    sequence_gaps: u64,
}

impl fmt::Debug for IngestBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestBuffer")
            .field("sensor", &self.sensor_label)
            .field("len", &self.index.len())
            .field("max_size", &self.max_size)
            .field("watermark", &self.watermark())
            .field("late_drops", &self.late_drops)
            .field("overflows", &self.overflows)
            .finish()
    }
}

impl IngestBuffer {
    /// Create a buffer for one sensor.
    pub fn new(sensor_label: impl Into<String>, config: &BufferConfig) -> Self {
        Self {
            sensor_label: sensor_label.into(),
            index: VecDeque::with_capacity(config.max_size),
            storage: Slab::with_capacity(config.max_size),
            max_size: config.max_size,
            max_reorder_tolerance: config.max_reorder_tolerance,
            max_seen: None,
            last_sequence: None,
            late_drops: 0,
            overflows: 0,
            out_of_order: 0,
            sequence_gaps: 0,
        }
    }

    /// Insert a reading in timestamp order. Never blocks.
    ///
    /// Readings behind the watermark are dropped and counted as late; on
    /// overflow the oldest entry is evicted first and counted.
    pub fn push(&mut self, reading: Reading) -> PushOutcome {
        let ts = reading.normalized_timestamp;
        let seq = reading.sequence;

        self.track_sequence(seq);

        if let Some(watermark) = self.watermark() {
            if ts < watermark {
                self.late_drops += 1;
                metrics::counter!(
                    "fusion_late_drops_total",
                    "sensor_id" => self.sensor_label.clone()
                )
                .increment(1);
                tracing::trace!(
                    sensor_id = %self.sensor_label,
                    timestamp = ts,
                    watermark,
                    "late reading dropped"
                );
                return PushOutcome::LateDropped;
            }
        }
        self.max_seen = Some(self.max_seen.map_or(ts, |m| m.max(ts)));

        if self.index.len() >= self.max_size {
            if let Some(oldest) = self.index.pop_front() {
                self.storage.remove(oldest.slab_key);
            }
            self.overflows += 1;
            metrics::counter!(
                "fusion_buffer_overflows_total",
                "sensor_id" => self.sensor_label.clone()
            )
            .increment(1);
        }

        let slab_key = self.storage.insert(reading);
        let pos = self
            .index
            .partition_point(|m| (m.timestamp, m.sequence) <= (ts, seq));
        if pos < self.index.len() {
            self.out_of_order += 1;
        }
        self.index.insert(
            pos,
            ReadingMeta {
                timestamp: ts,
                sequence: seq,
                slab_key,
            },
        );

        PushOutcome::Stored
    }

    /// Ordered read-only view of readings with timestamps in `[t0, t1)`.
    pub fn peek_range(&self, t0: Nanos, t1: Nanos) -> impl Iterator<Item = &Reading> {
        let start = self.index.partition_point(|m| m.timestamp < t0);
        let end = self.index.partition_point(|m| m.timestamp < t1);
        self.index
            .iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .filter_map(|m| self.storage.get(m.slab_key))
    }

    /// Remove and discard entries with timestamps before `t`.
    pub fn evict_before(&mut self, t: Nanos) -> usize {
        let mut evicted = 0;
        while self.index.front().is_some_and(|m| m.timestamp < t) {
            if let Some(meta) = self.index.pop_front() {
                self.storage.remove(meta.slab_key);
                evicted += 1;
            }
        }
        evicted
    }

    /// The timestamp below which no further out-of-order reading is expected.
    ///
    /// `None` until the first reading has been seen.
    pub fn watermark(&self) -> Option<Nanos> {
        self.max_seen.map(|m| m - self.max_reorder_tolerance)
    }

    /// Number of buffered readings.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Oldest buffered timestamp.
    pub fn oldest_timestamp(&self) -> Option<Nanos> {
        self.index.front().map(|m| m.timestamp)
    }

    /// Readings dropped for arriving behind the watermark.
    pub fn late_drops(&self) -> u64 {
        self.late_drops
    }

    /// Readings evicted because the buffer was full.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Readings that arrived out of timestamp order (but within tolerance).
    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    /// Missing sequence numbers detected at the source.
    pub fn sequence_gaps(&self) -> u64 {
        self.sequence_gaps
    }

    fn track_sequence(&mut self, seq: u64) {
        match self.last_sequence {
            None => self.last_sequence = Some(seq),
            Some(last) => {
                if seq > last + 1 {
                    self.sequence_gaps += seq - last - 1;
                }
                self.last_sequence = Some(last.max(seq));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{millis, ReadingPayload, SensorType};

    fn make_reading(ts: Nanos, seq: u64) -> Reading {
        Reading {
            sensor_id: "cam".into(),
            sensor_type: SensorType::Camera,
            device_timestamp: ts,
            normalized_timestamp: ts,
            sequence: seq,
            payload: ReadingPayload::Raw(Bytes::new()),
        }
    }

    fn buffer(max_size: usize, tolerance: Nanos) -> IngestBuffer {
        IngestBuffer::new(
            "cam",
            &BufferConfig {
                max_size,
                max_reorder_tolerance: tolerance,
                max_age: millis(1000),
            },
        )
    }

    #[test]
    fn test_peek_range_is_ordered_for_any_tolerated_interleaving() {
        let mut buf = buffer(32, millis(50));

        // Shuffled within the tolerance window
        for (ts, seq) in [
            (millis(30), 3),
            (millis(10), 1),
            (millis(40), 4),
            (millis(20), 2),
            (millis(50), 5),
        ] {
            assert_eq!(buf.push(make_reading(ts, seq)), PushOutcome::Stored);
        }

        let timestamps: Vec<Nanos> = buf
            .peek_range(0, millis(100))
            .map(|r| r.normalized_timestamp)
            .collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted);
        assert_eq!(timestamps.len(), 5);
        assert!(buf.out_of_order() > 0);
    }

    #[test]
    fn test_late_reading_dropped_and_counted() {
        let mut buf = buffer(32, millis(20));

        buf.push(make_reading(millis(100), 1));
        // 100 - 20 = 80ms watermark, 50ms is late
        assert_eq!(
            buf.push(make_reading(millis(50), 2)),
            PushOutcome::LateDropped
        );
        assert_eq!(buf.late_drops(), 1);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_overflow_evicts_oldest_first() {
        let mut buf = buffer(3, millis(1000));

        for seq in 1..=4u64 {
            buf.push(make_reading(millis(10 * seq as i64), seq));
        }

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.overflows(), 1);
        assert_eq!(buf.oldest_timestamp(), Some(millis(20)));
    }

    #[test]
    fn test_peek_range_bounds_are_half_open() {
        let mut buf = buffer(32, millis(1000));

        buf.push(make_reading(millis(10), 1));
        buf.push(make_reading(millis(20), 2));
        buf.push(make_reading(millis(30), 3));

        let in_range: Vec<Nanos> = buf
            .peek_range(millis(10), millis(30))
            .map(|r| r.normalized_timestamp)
            .collect();
        assert_eq!(in_range, vec![millis(10), millis(20)]);
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut buf = buffer(32, millis(1000));
        buf.push(make_reading(millis(10), 1));

        assert_eq!(buf.peek_range(0, millis(100)).count(), 1);
        assert_eq!(buf.peek_range(0, millis(100)).count(), 1);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_evict_before() {
        let mut buf = buffer(32, millis(1000));
        for seq in 1..=5u64 {
            buf.push(make_reading(millis(10 * seq as i64), seq));
        }

        let evicted = buf.evict_before(millis(35));
        assert_eq!(evicted, 3);
        assert_eq!(buf.oldest_timestamp(), Some(millis(40)));
    }

    #[test]
    fn test_watermark_tracks_max_seen() {
        let mut buf = buffer(32, millis(20));
        assert_eq!(buf.watermark(), None);

        buf.push(make_reading(millis(100), 1));
        assert_eq!(buf.watermark(), Some(millis(80)));

        // An out-of-order (but tolerated) reading must not move the watermark back
        buf.push(make_reading(millis(90), 2));
        assert_eq!(buf.watermark(), Some(millis(80)));
    }

    #[test]
    fn test_sequence_gap_detection() {
        let mut buf = buffer(32, millis(1000));
        buf.push(make_reading(millis(10), 1));
        buf.push(make_reading(millis(20), 2));
        buf.push(make_reading(millis(50), 5)); // 3 and 4 lost at the source

        assert_eq!(buf.sequence_gaps(), 2);
    }
}
