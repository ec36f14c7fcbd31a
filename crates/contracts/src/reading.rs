//! Reading types - source adapter output and normalizer output.
//!
//! Source adapters deliver [`RawReading`]s; the clock normalizer turns them
//! into [`Reading`]s by assigning a `normalized_timestamp` on the shared
//! monotonic time base. Modeling the two stages as distinct types makes
//! "normalized timestamp not yet assigned" unrepresentable downstream.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Nanos, SensorId};

/// Sensor category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Camera,
    Lidar,
    Imu,
    Gps,
    Radar,
}

/// One sample as delivered by a source adapter, before clock normalization.
///
/// Contract for adapters: `sequence` is strictly increasing per sensor, and
/// `arrival_timestamp` is captured on the pipeline monotonic clock at the
/// moment the sample was handed over. Delivery may be out of order up to the
/// configured reorder tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReading {
    /// Stable sensor identifier
    pub sensor_id: SensorId,

    /// Sensor category
    pub sensor_type: SensorType,

    /// Sensor-local clock (nanoseconds)
    pub device_timestamp: Nanos,

    /// Pipeline monotonic clock at hand-over (nanoseconds)
    pub arrival_timestamp: Nanos,

    /// Per-sensor strictly increasing sample counter
    pub sequence: u64,

    /// Data payload, exclusively owned by this reading
    pub payload: ReadingPayload,
}

impl RawReading {
    /// Attach the normalized timestamp assigned by the clock normalizer.
    pub fn into_reading(self, normalized_timestamp: Nanos) -> Reading {
        Reading {
            sensor_id: self.sensor_id,
            sensor_type: self.sensor_type,
            device_timestamp: self.device_timestamp,
            normalized_timestamp,
            sequence: self.sequence,
            payload: self.payload,
        }
    }
}

/// A clock-normalized sample.
///
/// Per sensor, `normalized_timestamp` is non-decreasing; the normalizer
/// rejects readings that would violate this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    /// Stable sensor identifier
    pub sensor_id: SensorId,

    /// Sensor category
    pub sensor_type: SensorType,

    /// Original sensor-local timestamp (kept for diagnostics)
    pub device_timestamp: Nanos,

    /// Timestamp on the shared monotonic time base
    pub normalized_timestamp: Nanos,

    /// Per-sensor strictly increasing sample counter
    pub sequence: u64,

    /// Data payload
    pub payload: ReadingPayload,
}

/// Tagged payload over the known sensor kinds.
///
/// `Raw` is the fallback for payloads whose schema is resolved by the source
/// adapters, not by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReadingPayload {
    /// Image data
    Image(ImageData),

    /// LiDAR point cloud
    PointCloud(PointCloudData),

    /// IMU sample
    Imu(ImuData),

    /// GPS fix
    Gps(GpsData),

    /// Radar detections
    Radar(RadarData),

    /// Opaque bytes (adapter-defined schema)
    Raw(Bytes),
}

impl ReadingPayload {
    /// Payload size in bytes, for queue/metric accounting.
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Image(d) => d.data.len(),
            Self::PointCloud(d) => d.data.len(),
            Self::Imu(_) => std::mem::size_of::<ImuData>(),
            Self::Gps(_) => std::mem::size_of::<GpsData>(),
            Self::Radar(d) => d.data.len(),
            Self::Raw(b) => b.len(),
        }
    }
}

/// Image payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Pixel format
    pub format: ImageFormat,

    /// Raw pixel bytes
    pub data: Bytes,
}

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Rgb8,
    Rgba8,
    Bgra8,
    Depth,
}

/// LiDAR point cloud payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloudData {
    /// Number of points
    pub num_points: u32,

    /// Bytes per point (typically 16: x, y, z, intensity as f32)
    pub point_stride: u32,

    /// Packed point data
    pub data: Bytes,
}

/// IMU payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImuData {
    /// Accelerometer (m/s²)
    pub accelerometer: Vector3,

    /// Gyroscope (rad/s)
    pub gyroscope: Vector3,
}

/// GPS payload
///
/// Absolute-time correction from GPS is out of scope; this is position only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GpsData {
    /// Latitude (degrees)
    pub latitude: f64,

    /// Longitude (degrees)
    pub longitude: f64,

    /// Altitude (meters)
    pub altitude: f64,
}

/// Radar payload
///
/// Detections are packed as `num_detections` records of `detection_stride`
/// bytes (4 f32 fields: range m, azimuth deg, radial velocity m/s, RCS dBsm).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarData {
    /// Number of detection records
    pub num_detections: u32,

    /// Bytes per detection record
    pub detection_stride: u32,

    /// Packed detection data
    pub data: Bytes,
}

/// 3D vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}
