//! Mock sensor sources.
//!
//! Synthetic readings for running the pipeline without hardware. Each source
//! simulates an imperfect device clock (fixed offset plus drift plus jitter)
//! so the clock normalizer has real work to do, and can optionally delay a
//! reading by one tick to exercise the reorder tolerance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::Sender;
use bytes::Bytes;
use contracts::{
    GpsData, ImageData, ImageFormat, ImuData, PointCloudData, RadarData, RawReading,
    ReadingPayload, SensorType, Vector3,
};
use observability::record_reading_generated;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::clock::MonotonicClock;

/// Mock source configuration
#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    /// Sensor identifier
    pub sensor_id: String,

    /// Sensor category
    pub sensor_type: SensorType,

    /// Emission frequency (Hz)
    pub frequency_hz: f64,

    /// Fixed device clock offset relative to the pipeline clock (ns)
    pub clock_offset: i64,

    /// Device clock drift (ns gained per second of pipeline time)
    pub clock_drift_per_sec: i64,

    /// Uniform timestamp jitter bound (ns)
    pub jitter: i64,

    /// Probability of delaying a reading by one tick (bounded reorder)
    pub reorder_probability: f64,

    /// Image size (Camera only)
    pub image_width: u32,
    pub image_height: u32,

    /// Point count (Lidar only)
    pub lidar_points: u32,
}

impl Default for MockSensorConfig {
    fn default() -> Self {
        Self {
            sensor_id: "mock_sensor".to_string(),
            sensor_type: SensorType::Imu,
            frequency_hz: 10.0,
            clock_offset: 0,
            clock_drift_per_sec: 0,
            jitter: 200_000,
            reorder_probability: 0.0,
            image_width: 800,
            image_height: 600,
            lidar_points: 10_000,
        }
    }
}

/// Mock sensor source.
///
/// Spawns a task emitting [`RawReading`]s into a shared channel at the
/// configured rate until stopped or the channel closes.
pub struct MockSensorSource {
    config: MockSensorConfig,
    running: Arc<AtomicBool>,
}

impl MockSensorSource {
    pub fn new(config: MockSensorConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn camera(sensor_id: &str, frequency_hz: f64, width: u32, height: u32) -> Self {
        Self::new(MockSensorConfig {
            sensor_id: sensor_id.to_string(),
            sensor_type: SensorType::Camera,
            frequency_hz,
            image_width: width,
            image_height: height,
            ..Default::default()
        })
    }

    pub fn lidar(sensor_id: &str, frequency_hz: f64, num_points: u32) -> Self {
        Self::new(MockSensorConfig {
            sensor_id: sensor_id.to_string(),
            sensor_type: SensorType::Lidar,
            frequency_hz,
            lidar_points: num_points,
            ..Default::default()
        })
    }

    /// High-rate IMU with a small chance of one-tick reorder.
    pub fn imu(sensor_id: &str, frequency_hz: f64) -> Self {
        Self::new(MockSensorConfig {
            sensor_id: sensor_id.to_string(),
            sensor_type: SensorType::Imu,
            frequency_hz,
            reorder_probability: 0.05,
            ..Default::default()
        })
    }

    pub fn gps(sensor_id: &str, frequency_hz: f64) -> Self {
        Self::new(MockSensorConfig {
            sensor_id: sensor_id.to_string(),
            sensor_type: SensorType::Gps,
            frequency_hz,
            ..Default::default()
        })
    }

    pub fn radar(sensor_id: &str, frequency_hz: f64) -> Self {
        Self::new(MockSensorConfig {
            sensor_id: sensor_id.to_string(),
            sensor_type: SensorType::Radar,
            frequency_hz,
            ..Default::default()
        })
    }

    /// Give this source a skewed device clock.
    pub fn with_clock_skew(mut self, offset: i64, drift_per_sec: i64) -> Self {
        self.config.clock_offset = offset;
        self.config.clock_drift_per_sec = drift_per_sec;
        self
    }

    /// Start emitting into `tx` with arrival timestamps from `clock`.
    pub fn start(&self, tx: Sender<RawReading>, clock: MonotonicClock) {
        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let interval = Duration::from_secs_f64(1.0 / config.frequency_hz);
            let mut sequence: u64 = 0;
            let mut held: Option<RawReading> = None;
            // StdRng is Send, unlike the thread-local rng
            let mut rng = StdRng::from_os_rng();

            debug!(
                sensor_id = %config.sensor_id,
                sensor_type = ?config.sensor_type,
                frequency_hz = config.frequency_hz,
                "mock sensor source started"
            );

            while running.load(Ordering::Relaxed) {
                sequence += 1;
                let reading = make_reading(&config, &clock, sequence, &mut rng);
                record_reading_generated(&config.sensor_id, type_label(config.sensor_type));

                // One-deep reorder: hold this reading back and release it
                // after the next one, so the swap stays within one tick.
                let to_send = if held.is_some() {
                    let mut out = vec![reading];
                    if let Some(h) = held.take() {
                        out.push(h);
                    }
                    out
                } else if rng.random_range(0.0..1.0) < config.reorder_probability {
                    held = Some(reading);
                    Vec::new()
                } else {
                    vec![reading]
                };

                for mut raw in to_send {
                    raw.arrival_timestamp = clock.now();
                    if tx.send(raw).await.is_err() {
                        debug!(sensor_id = %config.sensor_id, "mock sensor channel closed");
                        return;
                    }
                    trace!(sensor_id = %config.sensor_id, sequence, "mock reading sent");
                }

                tokio::time::sleep(interval).await;
            }

            debug!(sensor_id = %config.sensor_id, "mock sensor source stopped");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn sensor_id(&self) -> &str {
        &self.config.sensor_id
    }
}

fn make_reading(
    config: &MockSensorConfig,
    clock: &MonotonicClock,
    sequence: u64,
    rng: &mut impl Rng,
) -> RawReading {
    let now = clock.now();
    let drift = config.clock_drift_per_sec * now / 1_000_000_000;
    let jitter = if config.jitter > 0 {
        rng.random_range(-config.jitter..=config.jitter)
    } else {
        0
    };
    let device_timestamp = now + config.clock_offset + drift + jitter;

    RawReading {
        sensor_id: config.sensor_id.as_str().into(),
        sensor_type: config.sensor_type,
        device_timestamp,
        arrival_timestamp: now,
        sequence,
        payload: make_payload(config, sequence, rng),
    }
}

fn make_payload(config: &MockSensorConfig, sequence: u64, rng: &mut impl Rng) -> ReadingPayload {
    match config.sensor_type {
        SensorType::Camera => {
            let size = (config.image_width * config.image_height * 4) as usize;
            ReadingPayload::Image(ImageData {
                width: config.image_width,
                height: config.image_height,
                format: ImageFormat::Bgra8,
                data: Bytes::from(vec![128u8; size]),
            })
        }
        SensorType::Lidar => {
            let size = (config.lidar_points * 16) as usize;
            ReadingPayload::PointCloud(PointCloudData {
                num_points: config.lidar_points,
                point_stride: 16,
                data: Bytes::from(vec![0u8; size]),
            })
        }
        SensorType::Imu => ReadingPayload::Imu(ImuData {
            accelerometer: Vector3 {
                x: rng.random_range(-0.5..0.5),
                y: rng.random_range(-0.5..0.5),
                z: 9.81,
            },
            gyroscope: Vector3::default(),
        }),
        SensorType::Gps => ReadingPayload::Gps(GpsData {
            latitude: 40.0 + (sequence as f64 * 0.0001),
            longitude: -74.0 + (sequence as f64 * 0.0001),
            altitude: 100.0,
        }),
        SensorType::Radar => ReadingPayload::Radar(make_radar_detections(rng)),
    }
}

/// Synthetic long-range automotive radar frame.
///
/// Each detection is 4 little-endian f32 fields: range (0.2-250 m), azimuth
/// (-60 to 60 deg), radial velocity (-50 to 50 m/s), RCS (-10 to 30 dBsm).
fn make_radar_detections(rng: &mut impl Rng) -> RadarData {
    let num_detections = rng.random_range(3..12u32);
    let mut data = Vec::with_capacity((num_detections * 16) as usize);

    for _ in 0..num_detections {
        let range: f32 = rng.random_range(0.2..250.0);
        let azimuth: f32 = rng.random_range(-60.0..60.0);
        let velocity: f32 = rng.random_range(-50.0..50.0);
        let rcs: f32 = rng.random_range(-10.0..30.0);

        data.extend_from_slice(&range.to_le_bytes());
        data.extend_from_slice(&azimuth.to_le_bytes());
        data.extend_from_slice(&velocity.to_le_bytes());
        data.extend_from_slice(&rcs.to_le_bytes());
    }

    RadarData {
        num_detections,
        detection_stride: 16,
        data: Bytes::from(data),
    }
}

fn type_label(sensor_type: SensorType) -> &'static str {
    match sensor_type {
        SensorType::Camera => "camera",
        SensorType::Lidar => "lidar",
        SensorType::Imu => "imu",
        SensorType::Gps => "gps",
        SensorType::Radar => "radar",
    }
}
