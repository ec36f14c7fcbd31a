//! Pipeline run statistics.

use std::time::Duration;

use fusion_engine::EngineStats;
use observability::BatchMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Readings received from sources
    pub readings_received: u64,

    /// Readings rejected at ingest (clock regression)
    pub readings_rejected: u64,

    /// Batches emitted by the engine
    pub batches_emitted: u64,

    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Number of active sources
    pub active_sensors: usize,

    /// Number of sinks batches were dispatched to
    pub active_sinks: usize,

    /// Engine counter snapshot at shutdown
    pub engine: EngineStats,

    /// Per-batch aggregate metrics
    pub batch_metrics: BatchMetricsAggregator,
}

impl PipelineStats {
    /// Batches emitted per second of wall-clock time.
    pub fn batches_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.batches_emitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print a detailed run summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Readings received: {}", self.readings_received);
        println!("Readings rejected: {}", self.readings_rejected);
        println!("Batches emitted: {}", self.batches_emitted);
        println!("Batches/sec: {:.2}", self.batches_per_sec());
        println!("Active sensors: {}", self.active_sensors);
        println!("Active sinks: {}", self.active_sinks);

        println!("\n=== Engine Counters ===");
        println!("Windows discarded: {}", self.engine.windows_discarded);
        println!("Clock regressions: {}", self.engine.clock_regressions);
        println!("Late drops: {}", self.engine.late_drops);
        println!("Overflow evictions: {}", self.engine.overflows);
        println!("Sequence gaps: {}", self.engine.sequence_gaps);

        print!("\n{}", self.batch_metrics.summary());
    }
}
