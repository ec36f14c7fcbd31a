//! Engine facade composing normalizer, buffers, scheduler and assembler.

use std::collections::HashMap;

use contracts::{
    as_millis_f64, BatchMeta, FusionBatch, FusionConfig, Nanos, PipelineError, RawReading,
    SensorId,
};
use tracing::instrument;

use crate::assembler::assemble;
use crate::buffer::{IngestBuffer, PushOutcome};
use crate::clock::{AlignmentClock, ClockNormalizer};
use crate::scheduler::{WindowScheduler, WindowState};

/// Multi-sensor time synchronization and fusion engine.
///
/// Single-owner value: producers hand readings to the task that owns the
/// engine, which is the only writer of buffers and clock state. The alignment
/// clock is an owned field passed to the scheduler, never a global.
#[derive(Debug)]
pub struct FusionEngine {
    config: FusionConfig,
    normalizer: ClockNormalizer,
    buffers: HashMap<SensorId, IngestBuffer>,
    scheduler: WindowScheduler,
    clock: AlignmentClock,
    readings_ingested: u64,
    clock_regressions: u64,
}

impl FusionEngine {
    /// Create an engine; buffers are pre-allocated for the expected sensors.
    pub fn new(config: FusionConfig) -> Self {
        let mut buffers = HashMap::new();
        for sensor_id in &config.expected_sensors {
            buffers.insert(
                sensor_id.clone(),
                IngestBuffer::new(sensor_id.as_str(), &config.buffer),
            );
        }

        let normalizer = ClockNormalizer::new(
            config.clock.clone(),
            config.buffer.max_reorder_tolerance,
        );
        let scheduler = WindowScheduler::new(config.period, config.max_wait);

        Self {
            config,
            normalizer,
            buffers,
            scheduler,
            clock: AlignmentClock::default(),
            readings_ingested: 0,
            clock_regressions: 0,
        }
    }

    /// Normalize and buffer one reading.
    ///
    /// Per-sensor failures (clock regression) are returned to the caller and
    /// never affect other sensors; the reading is discarded in that case.
    #[instrument(
        level = "trace",
        name = "engine_ingest",
        skip(self, raw),
        fields(sensor_id = %raw.sensor_id, device_ts = raw.device_timestamp)
    )]
    pub fn ingest(&mut self, raw: RawReading) -> Result<(), PipelineError> {
        self.clock.advance(raw.arrival_timestamp);

        let normalized = match self.normalizer.normalize(
            &raw.sensor_id,
            raw.device_timestamp,
            raw.arrival_timestamp,
        ) {
            Ok(ts) => ts,
            Err(err) => {
                self.clock_regressions += 1;
                tracing::warn!(sensor_id = %raw.sensor_id, error = %err, "reading rejected");
                return Err(err);
            }
        };

        metrics::counter!(
            "fusion_readings_total",
            "sensor_id" => raw.sensor_id.to_string()
        )
        .increment(1);
        self.readings_ingested += 1;

        let sensor_id = raw.sensor_id.clone();
        let reading = raw.into_reading(normalized);
        let buffer = self
            .buffers
            .entry(sensor_id)
            .or_insert_with_key(|id| IngestBuffer::new(id.as_str(), &self.config.buffer));

        if buffer.push(reading) == PushOutcome::Stored {
            self.scheduler.observe(normalized);
        }
        Ok(())
    }

    /// Advance the alignment clock and emit every window that is ready.
    ///
    /// Batches come out in strictly increasing `window_id` order. Consumed
    /// and over-age readings are evicted so no buffer holds data older than
    /// `max_age` relative to the alignment clock.
    #[instrument(name = "engine_poll", skip(self), fields(now))]
    pub fn poll(&mut self, now: Nanos) -> Vec<FusionBatch> {
        self.clock.advance(now);
        let now = self.clock.now();

        let buffers = &self.buffers;
        let expected = &self.config.expected_sensors;
        let all_watermarks_past = |end: Nanos| {
            expected.iter().all(|id| {
                buffers
                    .get(id)
                    .and_then(IngestBuffer::watermark)
                    .is_some_and(|w| w >= end)
            })
        };
        let ready = self.scheduler.take_ready(now, all_watermarks_past);

        let mut batches = Vec::with_capacity(ready.len());
        for mut window in ready {
            let meta = BatchMeta {
                timed_out: window.timed_out,
                late_drops: self.total_late_drops(),
                overflows: self.total_overflows(),
                unsynchronized: self.normalizer.unsynchronized_sensors(),
            };
            let batch = assemble(&window, &self.config.expected_sensors, &self.buffers, now, meta);
            window.mark(WindowState::Emitted);
            self.scheduler.note_emitted(window.window_id);

            self.record_batch_metrics(&batch, now);

            for buffer in self.buffers.values_mut() {
                buffer.evict_before(window.end);
            }
            batches.push(batch);
        }

        let age_cutoff = now - self.config.buffer.max_age;
        for buffer in self.buffers.values_mut() {
            buffer.evict_before(age_cutoff);
        }

        batches
    }

    /// Alignment-clock deadline of the earliest open window, if any.
    pub fn next_deadline(&self) -> Option<Nanos> {
        self.scheduler.next_deadline()
    }

    /// Current alignment-clock time.
    pub fn alignment_now(&self) -> Nanos {
        self.clock.now()
    }

    /// Discard all open windows without emission.
    ///
    /// Assembly is atomic with respect to shutdown: `poll` either finishes a
    /// batch before this is called or the window is discarded whole.
    #[instrument(name = "engine_shutdown", skip(self))]
    pub fn shutdown(&mut self) -> usize {
        let discarded = self.scheduler.discard_open();
        if discarded > 0 {
            tracing::info!(discarded, "open windows discarded at shutdown");
        }
        discarded
    }

    /// Counter snapshot.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            readings_ingested: self.readings_ingested,
            batches_emitted: self.scheduler.emitted_total(),
            windows_discarded: self.scheduler.discarded_total(),
            clock_regressions: self.clock_regressions,
            late_drops: self.total_late_drops(),
            overflows: self.total_overflows(),
            sequence_gaps: self.buffers.values().map(IngestBuffer::sequence_gaps).sum(),
        }
    }

    fn total_late_drops(&self) -> u64 {
        self.buffers.values().map(IngestBuffer::late_drops).sum()
    }

    fn total_overflows(&self) -> u64 {
        self.buffers.values().map(IngestBuffer::overflows).sum()
    }

    fn record_batch_metrics(&self, batch: &FusionBatch, now: Nanos) {
        metrics::counter!("fusion_batches_total").increment(1);
        metrics::histogram!("fusion_completeness_ratio").record(batch.completeness);
        metrics::histogram!("fusion_emit_lag_ms").record(as_millis_f64(now - batch.window_end));
        for (sensor_id, buffer) in &self.buffers {
            metrics::gauge!(
                "fusion_buffer_depth",
                "sensor_id" => sensor_id.to_string()
            )
            .set(buffer.len() as f64);
        }
    }
}

/// Engine counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub readings_ingested: u64,
    pub batches_emitted: u64,
    pub windows_discarded: u64,
    pub clock_regressions: u64,
    pub late_drops: u64,
    pub overflows: u64,
    pub sequence_gaps: u64,
}
