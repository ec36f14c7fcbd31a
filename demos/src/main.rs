//! Mock pipeline demo.
//!
//! Runs the full fusion pipeline against synthetic sensors: a 20 Hz camera,
//! a 10 Hz lidar, a 100 Hz IMU with skewed clock and occasional reorder, a
//! 10 Hz GPS and a 15 Hz radar. Batches go to a log sink and optionally to a
//! JSONL file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use contracts::FusionConfig;
use dispatcher::SinkSpec;
use observability::{LogFormat, ObservabilityConfig};
use pipeline::{FusionPipeline, MockSensorSource, PipelineConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mock-pipeline", about = "Run the fusion pipeline on mock sensors")]
struct Args {
    /// Stop after this many emitted batches
    #[arg(long, default_value_t = 50)]
    max_batches: u64,

    /// Hard wall-clock limit in seconds
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,

    /// Write batches as JSON lines under this directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Human-readable log output instead of JSON
    #[arg(long)]
    pretty: bool,

    /// Prometheus port (omit to disable)
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    observability::init_with_config(ObservabilityConfig {
        log_format: if args.pretty {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        },
        metrics_port: args.metrics_port,
        default_log_level: "info".to_string(),
    })?;

    info!(version = env!("CARGO_PKG_VERSION"), "Mock pipeline demo starting");

    let fusion = FusionConfig::for_sensors([
        "cam_front",
        "lidar_top",
        "imu_main",
        "gps_main",
        "radar_front",
    ]);

    let mut config = PipelineConfig::new(fusion);
    config.max_batches = Some(args.max_batches);
    config.run_for = Some(Duration::from_secs(args.duration_secs));
    config.sinks.push(SinkSpec::log("console"));
    if let Some(dir) = &args.output_dir {
        config.sinks.push(SinkSpec::jsonl_file("jsonl", dir));
    }

    let mut pipe = FusionPipeline::new(config);
    pipe.add_source(MockSensorSource::camera("cam_front", 20.0, 800, 600));
    pipe.add_source(MockSensorSource::lidar("lidar_top", 10.0, 20_000));
    pipe.add_source(
        // 2 ms ahead, gaining 50 us per second
        MockSensorSource::imu("imu_main", 100.0).with_clock_skew(2_000_000, 50_000),
    );
    pipe.add_source(MockSensorSource::gps("gps_main", 10.0));
    pipe.add_source(MockSensorSource::radar("radar_front", 15.0));

    let stats = pipe.run().await?;
    stats.print_summary();

    Ok(())
}
