//! Pipeline runner - wires sources, engine and dispatcher together.
//!
//! Single-owner concurrency: source tasks are producers into one bounded
//! channel; the runner task is the only owner of the engine and therefore the
//! only writer of buffers and clock state. Emitted batches leave through
//! non-blocking dispatcher handles.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_channel::bounded;
use contracts::{DispatchConfig, FusionConfig, RawReading};
use dispatcher::{spawn_sink, DispatcherHandle, SinkSpec};
use fusion_engine::{FusionBatch, FusionEngine};
use tracing::{debug, info, warn};

use crate::clock::MonotonicClock;
use crate::mock::MockSensorSource;
use crate::stats::PipelineStats;

/// End-to-end pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Engine configuration (sensors, windows, clock, buffers)
    pub fusion: FusionConfig,

    /// Dispatch policy applied to every sink
    pub dispatch: DispatchConfig,

    /// Sinks to deliver batches to
    pub sinks: Vec<SinkSpec>,

    /// Stop after this many emitted batches (None = unlimited)
    pub max_batches: Option<u64>,

    /// Stop after this much wall-clock time (None = until sources close)
    pub run_for: Option<Duration>,

    /// Reading channel capacity
    pub channel_capacity: usize,
}

impl PipelineConfig {
    pub fn new(fusion: FusionConfig) -> Self {
        Self {
            fusion,
            dispatch: DispatchConfig::default(),
            sinks: Vec::new(),
            max_batches: None,
            run_for: None,
            channel_capacity: 256,
        }
    }
}

/// Owns the sources and drives the engine to completion.
pub struct FusionPipeline {
    config: PipelineConfig,
    sources: Vec<MockSensorSource>,
    extra_handles: Vec<DispatcherHandle>,
}

impl FusionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            extra_handles: Vec::new(),
        }
    }

    /// Register a source to be started with the pipeline.
    pub fn add_source(&mut self, source: MockSensorSource) {
        self.sources.push(source);
    }

    /// Attach an already-spawned dispatcher handle.
    pub fn add_sink_handle(&mut self, handle: DispatcherHandle) {
        self.extra_handles.push(handle);
    }

    /// Run until a stop condition is reached, then shut everything down.
    ///
    /// Shutdown takes one final poll before discarding: windows that already
    /// satisfy the normal close policy (watermarks past the end, or `max_wait`
    /// elapsed) are emitted, and only still-open windows are discarded.
    pub async fn run(mut self) -> Result<PipelineStats> {
        let start_time = Instant::now();

        let fusion_config = self
            .config
            .fusion
            .clone()
            .validated()
            .context("Invalid fusion configuration")?;

        let mut handles = self.extra_handles;
        for spec in &self.config.sinks {
            let handle = spawn_sink(spec, self.config.dispatch.clone())
                .with_context(|| format!("Failed to create sink '{}'", spec.name))?;
            handles.push(handle);
        }
        if handles.is_empty() {
            warn!("No sinks configured - batches will be dropped after metrics");
        }

        let clock = MonotonicClock::start();
        let (tx, rx) = bounded::<RawReading>(self.config.channel_capacity);

        for source in &self.sources {
            source.start(tx.clone(), clock);
        }
        drop(tx);

        let mut engine = FusionEngine::new(fusion_config);
        let mut stats = PipelineStats {
            active_sensors: self.sources.len(),
            active_sinks: handles.len(),
            ..Default::default()
        };

        info!(
            sensors = stats.active_sensors,
            sinks = stats.active_sinks,
            max_batches = ?self.config.max_batches,
            "Pipeline running"
        );

        let run_deadline = self
            .config
            .run_for
            .map(|d| tokio::time::Instant::now() + d);

        'run: loop {
            let engine_deadline = engine.next_deadline().map(|ts| clock.instant_at(ts));

            tokio::select! {
                reading = rx.recv() => match reading {
                    Ok(raw) => {
                        stats.readings_received += 1;
                        if engine.ingest(raw).is_err() {
                            stats.readings_rejected += 1;
                        }
                    }
                    Err(_) => {
                        debug!("All sources closed");
                        break 'run;
                    }
                },
                _ = maybe_sleep(engine_deadline) => {}
                _ = maybe_sleep(run_deadline) => {
                    info!("Run duration elapsed");
                    break 'run;
                }
            }

            for batch in engine.poll(clock.now()) {
                stats.batches_emitted += 1;
                stats.batch_metrics.update(&batch);
                dispatch_batch(&handles, batch);

                if self
                    .config
                    .max_batches
                    .is_some_and(|max| stats.batches_emitted >= max)
                {
                    info!(batches = stats.batches_emitted, "Reached max batches limit");
                    break 'run;
                }
            }
        }

        info!("Shutting down pipeline...");
        for source in &self.sources {
            source.stop();
        }

        // Emit whatever is closable, then drop what is not
        for batch in engine.poll(clock.now()) {
            stats.batches_emitted += 1;
            stats.batch_metrics.update(&batch);
            dispatch_batch(&handles, batch);
        }
        engine.shutdown();
        stats.engine = engine.stats();

        for handle in handles {
            handle.shutdown().await;
        }

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            batches = stats.batches_emitted,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

fn dispatch_batch(handles: &[DispatcherHandle], batch: FusionBatch) {
    for handle in handles {
        let accepted = handle.try_send(batch.clone());
        observability::record_batch_dispatched(handle.name(), accepted);
    }
}

async fn maybe_sleep(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
