//! Fusion batch assembly.
//!
//! `assemble` is a pure function of the window and the current buffer
//! contents: no hidden state, never fails, idempotent while the buffers are
//! unchanged. Absence of data is represented as [`BatchSlot::Missing`].

use std::collections::HashMap;

use contracts::{BatchMeta, BatchSlot, FusionBatch, Nanos, Reading, SensorId};

use crate::buffer::IngestBuffer;
use crate::scheduler::SyncWindow;

/// Build the batch for one window from the per-sensor buffers.
///
/// Per expected sensor: take the readings inside `[start, end)`, select the
/// one nearest to the window center, break exact ties by lower sequence
/// number, and record `Missing` when none qualify.
pub fn assemble(
    window: &SyncWindow,
    expected_sensors: &[SensorId],
    buffers: &HashMap<SensorId, IngestBuffer>,
    emit_timestamp: Nanos,
    meta: BatchMeta,
) -> FusionBatch {
    let center = window.center();
    let mut slots = HashMap::with_capacity(expected_sensors.len());
    let mut present = 0usize;

    for sensor_id in expected_sensors {
        let selected = buffers
            .get(sensor_id)
            .and_then(|buffer| select_nearest(buffer.peek_range(window.start, window.end), center));

        let slot = match selected {
            Some(reading) => {
                present += 1;
                BatchSlot::Reading(reading.clone())
            }
            None => BatchSlot::Missing,
        };
        slots.insert(sensor_id.clone(), slot);
    }

    let completeness = if expected_sensors.is_empty() {
        0.0
    } else {
        present as f64 / expected_sensors.len() as f64
    };

    FusionBatch {
        window_id: window.window_id,
        window_start: window.start,
        window_end: window.end,
        emit_timestamp,
        slots,
        completeness,
        meta,
    }
}

fn select_nearest<'a>(
    readings: impl Iterator<Item = &'a Reading>,
    center: Nanos,
) -> Option<&'a Reading> {
    readings.min_by_key(|r| ((r.normalized_timestamp - center).abs(), r.sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{millis, BufferConfig, ReadingPayload, SensorType};
    use crate::scheduler::WindowScheduler;

    fn make_reading(sensor: &str, ts: Nanos, seq: u64) -> Reading {
        Reading {
            sensor_id: sensor.into(),
            sensor_type: SensorType::Camera,
            device_timestamp: ts,
            normalized_timestamp: ts,
            sequence: seq,
            payload: ReadingPayload::Raw(Bytes::new()),
        }
    }

    fn buffer_with(sensor: &str, readings: Vec<Reading>) -> IngestBuffer {
        let mut buf = IngestBuffer::new(
            sensor,
            &BufferConfig {
                max_size: 64,
                max_reorder_tolerance: millis(1000),
                max_age: millis(10_000),
            },
        );
        for r in readings {
            buf.push(r);
        }
        buf
    }

    fn window_zero() -> SyncWindow {
        let mut s = WindowScheduler::new(millis(100), millis(150));
        s.observe(millis(1));
        s.take_ready(millis(200), |_| true).pop().unwrap()
    }

    #[test]
    fn test_selects_nearest_to_center() {
        let expected: Vec<SensorId> = vec!["cam".into()];
        let mut buffers = HashMap::new();
        buffers.insert(
            SensorId::from("cam"),
            buffer_with(
                "cam",
                vec![
                    make_reading("cam", millis(10), 1),
                    make_reading("cam", millis(45), 2), // nearest to 50ms
                    make_reading("cam", millis(90), 3),
                ],
            ),
        );

        let batch = assemble(&window_zero(), &expected, &buffers, millis(200), BatchMeta::default());
        let selected = batch.slots.get("cam").unwrap().reading().unwrap();
        assert_eq!(selected.normalized_timestamp, millis(45));
        assert_eq!(batch.completeness, 1.0);
    }

    #[test]
    fn test_exact_tie_broken_by_lower_sequence() {
        let expected: Vec<SensorId> = vec!["cam".into()];
        let mut buffers = HashMap::new();
        // 40ms and 60ms are both 10ms from the 50ms center
        buffers.insert(
            SensorId::from("cam"),
            buffer_with(
                "cam",
                vec![
                    make_reading("cam", millis(40), 7),
                    make_reading("cam", millis(60), 3),
                ],
            ),
        );

        let batch = assemble(&window_zero(), &expected, &buffers, millis(200), BatchMeta::default());
        let selected = batch.slots.get("cam").unwrap().reading().unwrap();
        assert_eq!(selected.sequence, 3);
    }

    #[test]
    fn test_missing_sensor_is_explicit() {
        let expected: Vec<SensorId> = vec!["cam".into(), "lidar".into()];
        let mut buffers = HashMap::new();
        buffers.insert(
            SensorId::from("cam"),
            buffer_with("cam", vec![make_reading("cam", millis(50), 1)]),
        );
        buffers.insert(SensorId::from("lidar"), buffer_with("lidar", vec![]));

        let batch = assemble(&window_zero(), &expected, &buffers, millis(200), BatchMeta::default());
        assert!(batch.slots.get("cam").unwrap().is_present());
        assert!(!batch.slots.get("lidar").unwrap().is_present());
        assert_eq!(batch.completeness, 0.5);
        assert_eq!(batch.slots.len(), 2);
    }

    #[test]
    fn test_readings_outside_window_ignored() {
        let expected: Vec<SensorId> = vec!["cam".into()];
        let mut buffers = HashMap::new();
        buffers.insert(
            SensorId::from("cam"),
            buffer_with(
                "cam",
                vec![
                    make_reading("cam", millis(100), 1), // window end is exclusive
                    make_reading("cam", millis(160), 2),
                ],
            ),
        );

        let batch = assemble(&window_zero(), &expected, &buffers, millis(200), BatchMeta::default());
        assert!(!batch.slots.get("cam").unwrap().is_present());
        assert_eq!(batch.completeness, 0.0);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let expected: Vec<SensorId> = vec!["cam".into(), "lidar".into()];
        let mut buffers = HashMap::new();
        buffers.insert(
            SensorId::from("cam"),
            buffer_with(
                "cam",
                vec![
                    make_reading("cam", millis(30), 1),
                    make_reading("cam", millis(55), 2),
                ],
            ),
        );
        buffers.insert(
            SensorId::from("lidar"),
            buffer_with("lidar", vec![make_reading("lidar", millis(70), 1)]),
        );

        let window = window_zero();
        let a = assemble(&window, &expected, &buffers, millis(200), BatchMeta::default());
        let b = assemble(&window, &expected, &buffers, millis(200), BatchMeta::default());

        assert_eq!(a.window_id, b.window_id);
        assert_eq!(a.completeness, b.completeness);
        for id in &expected {
            let sa = a.slots.get(id).unwrap().reading().map(|r| r.sequence);
            let sb = b.slots.get(id).unwrap().reading().map(|r| r.sequence);
            assert_eq!(sa, sb);
        }
    }
}
