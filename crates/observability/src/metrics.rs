//! Batch metrics collection
//!
//! Aggregates per-batch statistics from [`FusionBatch`] metadata.

use contracts::{as_millis_f64, FusionBatch};
use metrics::counter;

/// Record a synthetic reading leaving a source.
pub fn record_reading_generated(sensor_id: &str, sensor_type: &str) {
    counter!(
        "fusion_readings_generated_total",
        "sensor_id" => sensor_id.to_string(),
        "sensor_type" => sensor_type.to_string()
    )
    .increment(1);
}

/// Record a batch leaving the dispatcher toward a sink.
pub fn record_batch_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "fusion_batches_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// In-memory aggregator over emitted batches.
///
/// Complements the Prometheus counters with an end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsAggregator {
    /// Batches observed
    pub total_batches: u64,

    /// Batches that closed on timeout rather than watermark
    pub timed_out_batches: u64,

    /// Batches with at least one missing expected sensor
    pub batches_with_missing: u64,

    /// Late-dropped readings accumulated across batches
    pub total_late_drops: u64,

    /// Overflow evictions accumulated across batches
    pub total_overflows: u64,

    /// Completeness ratio statistics
    pub completeness_stats: RunningStats,

    /// Emit lag (emit_timestamp - window_end) statistics, in milliseconds
    pub emit_lag_stats: RunningStats,

    /// Per-sensor missing counts
    pub missing_counts: std::collections::HashMap<String, u64>,
}

impl BatchMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one emitted batch into the aggregate.
    pub fn update(&mut self, batch: &FusionBatch) {
        self.total_batches += 1;

        if batch.meta.timed_out {
            self.timed_out_batches += 1;
        }
        self.total_late_drops = self.total_late_drops.max(batch.meta.late_drops);
        self.total_overflows = self.total_overflows.max(batch.meta.overflows);

        let missing: Vec<_> = batch.missing_sensors().collect();
        if !missing.is_empty() {
            self.batches_with_missing += 1;
            for sensor_id in missing {
                *self.missing_counts.entry(sensor_id.to_string()).or_insert(0) += 1;
            }
        }

        self.completeness_stats.push(batch.completeness);
        self.emit_lag_stats
            .push(as_millis_f64(batch.emit_timestamp - batch.window_end));
    }

    /// Produce a summary report.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_batches: self.total_batches,
            timed_out_batches: self.timed_out_batches,
            batches_with_missing: self.batches_with_missing,
            total_late_drops: self.total_late_drops,
            total_overflows: self.total_overflows,
            timeout_rate: if self.total_batches > 0 {
                self.timed_out_batches as f64 / self.total_batches as f64 * 100.0
            } else {
                0.0
            },
            missing_rate: if self.total_batches > 0 {
                self.batches_with_missing as f64 / self.total_batches as f64 * 100.0
            } else {
                0.0
            },
            completeness: StatsSummary::from(&self.completeness_stats),
            emit_lag_ms: StatsSummary::from(&self.emit_lag_stats),
            sensor_missing_counts: self.missing_counts.clone(),
        }
    }

    /// Reset all statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Summary report over a run
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_batches: u64,
    pub timed_out_batches: u64,
    pub batches_with_missing: u64,
    pub total_late_drops: u64,
    pub total_overflows: u64,
    pub timeout_rate: f64,
    pub missing_rate: f64,
    pub completeness: StatsSummary,
    pub emit_lag_ms: StatsSummary,
    pub sensor_missing_counts: std::collections::HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Fusion Metrics Summary ===")?;
        writeln!(f, "Total batches: {}", self.total_batches)?;
        writeln!(
            f,
            "Timed-out batches: {} ({:.2}%)",
            self.timed_out_batches, self.timeout_rate
        )?;
        writeln!(
            f,
            "Batches with missing sensors: {} ({:.2}%)",
            self.batches_with_missing, self.missing_rate
        )?;
        writeln!(f, "Late drops: {}", self.total_late_drops)?;
        writeln!(f, "Overflow evictions: {}", self.total_overflows)?;
        writeln!(f, "Completeness: {}", self.completeness)?;
        writeln!(f, "Emit lag (ms): {}", self.emit_lag_ms)?;

        if !self.sensor_missing_counts.is_empty() {
            writeln!(f, "Missing sensor counts:")?;
            for (sensor, count) in &self.sensor_missing_counts {
                writeln!(f, "  {}: {}", sensor, count)?;
            }
        }

        Ok(())
    }
}

/// Summary of a single statistic
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Fold in a new value.
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
