//! Clock normalization: maps sensor-local timestamps onto the pipeline's
//! shared monotonic time base.
//!
//! One [`SensorClockState`] per sensor, mutated only by readings from that
//! sensor. The offset estimator is a bounded exponential smoother; a first
//! reading (or the first after a regression) bootstraps the offset with no
//! smoothing.

use std::collections::HashMap;

use contracts::{ClockConfig, Nanos, PipelineError, SensorId, NANOS_PER_SEC};

/// Mutable clock state for one sensor.
#[derive(Debug, Clone)]
pub struct SensorClockState {
    /// Estimated offset from device clock to the monotonic base (ns)
    offset: f64,
    /// Estimated offset change per device-clock second (ns/s)
    drift_rate: f64,
    /// Device timestamp of the last accepted reading
    last_sync_device_ts: Nanos,
    /// Normalized timestamp of the last accepted reading
    last_sync_normalized_ts: Nanos,
    /// False until bootstrapped, and again after a regression
    synchronized: bool,
}

impl SensorClockState {
    fn new() -> Self {
        Self {
            offset: 0.0,
            drift_rate: 0.0,
            last_sync_device_ts: 0,
            last_sync_normalized_ts: 0,
            synchronized: false,
        }
    }

    /// Current offset estimate (ns).
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Current drift estimate (ns per device-clock second).
    pub fn drift_rate(&self) -> f64 {
        self.drift_rate
    }

    /// Whether the sensor currently has a valid clock mapping.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }
}

/// Per-sensor clock normalizer.
#[derive(Debug)]
pub struct ClockNormalizer {
    config: ClockConfig,
    /// Regressions within this bound are treated as out-of-order arrival,
    /// not as a device clock jump; the buffer sorts or drops them.
    reorder_tolerance: Nanos,
    states: HashMap<SensorId, SensorClockState>,
}

impl ClockNormalizer {
    /// Create a normalizer.
    ///
    /// `reorder_tolerance` must match the ingest buffer configuration so the
    /// two components agree on what counts as tolerable reordering.
    pub fn new(config: ClockConfig, reorder_tolerance: Nanos) -> Self {
        Self {
            config,
            reorder_tolerance,
            states: HashMap::new(),
        }
    }

    /// Map a device timestamp onto the monotonic base.
    ///
    /// `arrival_ts` is the pipeline monotonic clock captured when the reading
    /// was handed over; `arrival - device` is the offset observation.
    ///
    /// # Errors
    /// [`PipelineError::ClockRegression`] when the normalized timestamp would
    /// fall behind the sensor's previous one by more than the reorder
    /// tolerance. The sensor is then unsynchronized until its next reading,
    /// which re-bootstraps.
    pub fn normalize(
        &mut self,
        sensor_id: &SensorId,
        device_ts: Nanos,
        arrival_ts: Nanos,
    ) -> Result<Nanos, PipelineError> {
        let state = self
            .states
            .entry(sensor_id.clone())
            .or_insert_with(SensorClockState::new);

        let observed = (arrival_ts - device_ts) as f64;

        if !state.synchronized {
            state.offset = observed;
            state.drift_rate = 0.0;
            state.last_sync_device_ts = device_ts;
            state.last_sync_normalized_ts = arrival_ts;
            state.synchronized = true;

            tracing::debug!(
                sensor_id = %sensor_id,
                offset_ns = state.offset,
                "clock bootstrap"
            );
            metrics::counter!(
                "fusion_clock_bootstraps_total",
                "sensor_id" => sensor_id.to_string()
            )
            .increment(1);

            return Ok(arrival_ts);
        }

        let correction = (self.config.smoothing_alpha * (observed - state.offset)).clamp(
            -(self.config.max_correction as f64),
            self.config.max_correction as f64,
        );
        let new_offset = state.offset + correction;
        let normalized = device_ts + new_offset.round() as Nanos;

        if normalized < state.last_sync_normalized_ts - self.reorder_tolerance {
            state.synchronized = false;
            metrics::counter!(
                "fusion_clock_regressions_total",
                "sensor_id" => sensor_id.to_string()
            )
            .increment(1);
            return Err(PipelineError::ClockRegression {
                sensor_id: sensor_id.clone(),
                last_normalized: state.last_sync_normalized_ts,
                attempted: normalized,
            });
        }

        if normalized < state.last_sync_normalized_ts {
            // Bounded out-of-order arrival: pass through without touching the
            // estimator, the ingest buffer handles ordering.
            return Ok(normalized);
        }

        let d_device = (device_ts - state.last_sync_device_ts) as f64;
        if d_device > 0.0 {
            let instant_drift = (new_offset - state.offset) / d_device * NANOS_PER_SEC as f64;
            state.drift_rate +=
                self.config.smoothing_alpha * (instant_drift - state.drift_rate);
        }

        state.offset = new_offset;
        state.last_sync_device_ts = device_ts;
        state.last_sync_normalized_ts = normalized;

        Ok(normalized)
    }

    /// Clock state for one sensor, if it has been seen.
    pub fn state(&self, sensor_id: &str) -> Option<&SensorClockState> {
        self.states.get(sensor_id)
    }

    /// Sensors currently excluded because their clock state is invalid.
    pub fn unsynchronized_sensors(&self) -> Vec<SensorId> {
        self.states
            .iter()
            .filter(|(_, s)| !s.synchronized)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Alignment clock advanced by the scheduler.
///
/// A plain owned value handed to the scheduler by the engine; deliberately
/// not a global. `advance` is monotone, late observations never move it back.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlignmentClock {
    now: Nanos,
}

impl AlignmentClock {
    /// Advance to `to` if it is ahead of the current time.
    #[inline]
    pub fn advance(&mut self, to: Nanos) -> Nanos {
        self.now = self.now.max(to);
        self.now
    }

    /// Current alignment time.
    #[inline]
    pub fn now(&self) -> Nanos {
        self.now
    }
}
