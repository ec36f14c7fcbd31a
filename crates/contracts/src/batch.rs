//! FusionBatch - fusion engine output.
//!
//! One time-aligned batch per emitted synchronization window. Immutable once
//! constructed; absence of sensor data is represented explicitly, never
//! silently omitted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Nanos, Reading, SensorId};

/// Per-sensor slot inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSlot {
    /// The reading selected for this window (nearest to window center)
    Reading(Reading),

    /// No qualifying reading for this sensor in this window
    Missing,
}

impl BatchSlot {
    /// Whether this slot holds a reading.
    #[inline]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Reading(_))
    }

    /// The selected reading, if any.
    #[inline]
    pub fn reading(&self) -> Option<&Reading> {
        match self {
            Self::Reading(r) => Some(r),
            Self::Missing => None,
        }
    }
}

/// Time-aligned output batch for one window `[window_start, window_end)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionBatch {
    /// Window index on the alignment clock (strictly increasing at emission)
    pub window_id: u64,

    /// Window start on the normalized clock (inclusive)
    pub window_start: Nanos,

    /// Window end on the normalized clock (exclusive)
    pub window_end: Nanos,

    /// Alignment-clock time at which the batch was emitted
    pub emit_timestamp: Nanos,

    /// One slot per expected sensor
    pub slots: HashMap<SensorId, BatchSlot>,

    /// Fraction of expected sensors present (0.0 - 1.0)
    pub completeness: f64,

    /// Emission diagnostics
    pub meta: BatchMeta,
}

impl FusionBatch {
    /// Number of slots holding a reading.
    pub fn present_count(&self) -> usize {
        self.slots.values().filter(|s| s.is_present()).count()
    }

    /// Sensors marked missing in this batch.
    pub fn missing_sensors(&self) -> impl Iterator<Item = &SensorId> {
        self.slots
            .iter()
            .filter(|(_, slot)| !slot.is_present())
            .map(|(id, _)| id)
    }

    /// Whether every expected sensor contributed a reading.
    pub fn is_complete(&self) -> bool {
        self.completeness >= 1.0
    }
}

/// Diagnostics attached to every emitted batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchMeta {
    /// Whether the window closed on `max_wait` rather than on watermarks
    pub timed_out: bool,

    /// Late-arrival drops across all buffers at emission time (cumulative)
    pub late_drops: u64,

    /// Capacity-overflow drops across all buffers at emission time (cumulative)
    pub overflows: u64,

    /// Sensors excluded because their clock state was unsynchronized
    pub unsynchronized: Vec<SensorId>,
}
