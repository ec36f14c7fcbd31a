//! # Integration Tests
//!
//! End-to-end and cross-crate tests:
//! - Contract wire-format snapshots
//! - Mock end-to-end pipeline runs
//! - Dispatcher fan-out and outage recovery

#[cfg(test)]
mod contract_tests {
    use contracts::{millis, FusionConfig};

    #[test]
    fn test_config_wire_format_is_stable() {
        let json = r#"{
            "expected_sensors": ["cam_front", "lidar_top", "imu_main"],
            "period": 50000000,
            "clock": { "smoothing_alpha": 0.2, "max_correction": 2000000 }
        }"#;

        let config: FusionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.expected_sensors.len(), 3);
        assert_eq!(config.period, millis(50));
        assert_eq!(config.max_wait, millis(150));
        assert!((config.clock.smoothing_alpha - 0.2).abs() < 1e-12);
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_batch_slot_serializes_missing_explicitly() {
        use contracts::BatchSlot;

        let json = serde_json::to_string(&BatchSlot::Missing).unwrap();
        assert_eq!(json, r#""missing""#);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use contracts::{DispatchConfig, FusionConfig};
    use dispatcher::{DispatcherHandle, MemorySink};
    use pipeline::{FusionPipeline, MockSensorSource, PipelineConfig};

    /// Full data flow: mock sources -> fusion engine -> dispatcher -> sink.
    ///
    /// Verifies delivered batches have strictly increasing window ids and
    /// cover the expected sensor set.
    #[tokio::test]
    async fn test_e2e_mock_pipeline() {
        let fusion = FusionConfig::for_sensors(["cam", "lidar", "imu"]);
        let mut config = PipelineConfig::new(fusion);
        config.max_batches = Some(4);
        config.run_for = Some(Duration::from_secs(10));

        let sink = MemorySink::new("mem");
        let collected = sink.batches();

        let mut pipe = FusionPipeline::new(config);
        pipe.add_source(MockSensorSource::camera("cam", 20.0, 64, 48));
        pipe.add_source(MockSensorSource::lidar("lidar", 10.0, 500));
        pipe.add_source(MockSensorSource::imu("imu", 100.0));
        pipe.add_sink_handle(DispatcherHandle::spawn(sink, DispatchConfig::default()));

        let stats = pipe.run().await.unwrap();

        assert!(stats.batches_emitted >= 4, "expected batches, got {stats:?}");
        assert!(stats.readings_received > 0);

        let batches = collected.lock().unwrap();
        assert!(!batches.is_empty());
        assert!(batches.windows(2).all(|w| w[0].window_id < w[1].window_id));
        for batch in batches.iter() {
            assert_eq!(batch.slots.len(), 3, "every expected sensor gets a slot");
            assert!(batch.window_start < batch.window_end);
            assert!(batch.emit_timestamp >= batch.window_end || batch.meta.timed_out);
        }
    }

    /// Sensors with skewed device clocks still align: the normalizer absorbs
    /// a fixed offset plus drift and batches remain mostly complete.
    #[tokio::test]
    async fn test_e2e_skewed_clocks_still_align() {
        let fusion = FusionConfig::for_sensors(["imu_a", "imu_b"]);
        let mut config = PipelineConfig::new(fusion);
        config.max_batches = Some(3);
        config.run_for = Some(Duration::from_secs(10));

        let sink = MemorySink::new("mem");
        let collected = sink.batches();

        let mut pipe = FusionPipeline::new(config);
        pipe.add_source(
            MockSensorSource::imu("imu_a", 100.0).with_clock_skew(3_000_000, 1_000),
        );
        pipe.add_source(
            MockSensorSource::imu("imu_b", 100.0).with_clock_skew(-2_000_000, -500),
        );
        pipe.add_sink_handle(DispatcherHandle::spawn(sink, DispatchConfig::default()));

        let stats = pipe.run().await.unwrap();
        assert!(stats.batches_emitted >= 3);

        let batches = collected.lock().unwrap();
        let complete = batches.iter().filter(|b| b.is_complete()).count();
        assert!(
            complete * 2 >= batches.len(),
            "at 100 Hz most windows should be complete: {complete}/{}",
            batches.len()
        );
    }

    /// A sensor that never reports leaves explicit Missing slots, and windows
    /// close on max_wait rather than stalling.
    #[tokio::test]
    async fn test_e2e_silent_sensor_yields_missing_slots() {
        let fusion = FusionConfig::for_sensors(["imu", "radar_silent"]);
        let mut config = PipelineConfig::new(fusion);
        config.max_batches = Some(2);
        config.run_for = Some(Duration::from_secs(10));

        let sink = MemorySink::new("mem");
        let collected = sink.batches();

        let mut pipe = FusionPipeline::new(config);
        pipe.add_source(MockSensorSource::imu("imu", 100.0));
        // radar_silent is expected but never started
        pipe.add_sink_handle(DispatcherHandle::spawn(sink, DispatchConfig::default()));

        let stats = pipe.run().await.unwrap();
        assert!(stats.batches_emitted >= 2);

        let batches = collected.lock().unwrap();
        for batch in batches.iter() {
            assert!(batch.meta.timed_out, "silent sensor forces timeout close");
            assert!(batch
                .missing_sensors()
                .any(|id| id.as_str() == "radar_silent"));
            assert!(batch.completeness <= 0.5);
        }
    }

    /// Fan-out to two sinks: both receive every batch.
    #[tokio::test]
    async fn test_dispatcher_fanout_to_multiple_sinks() {
        let fusion = FusionConfig::for_sensors(["imu"]);
        let mut config = PipelineConfig::new(fusion);
        config.max_batches = Some(2);
        config.run_for = Some(Duration::from_secs(10));

        let sink_a = MemorySink::new("mem_a");
        let sink_b = MemorySink::new("mem_b");
        let collected_a = sink_a.batches();
        let collected_b = sink_b.batches();

        let mut pipe = FusionPipeline::new(config);
        pipe.add_source(MockSensorSource::imu("imu", 100.0));
        pipe.add_sink_handle(DispatcherHandle::spawn(sink_a, DispatchConfig::default()));
        pipe.add_sink_handle(DispatcherHandle::spawn(sink_b, DispatchConfig::default()));

        pipe.run().await.unwrap();

        let a = collected_a.lock().unwrap();
        let b = collected_b.lock().unwrap();
        assert!(!a.is_empty());
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].window_id, b[0].window_id);
    }

    /// JSONL file sink end to end: batches land on disk as parseable lines.
    #[tokio::test]
    async fn test_e2e_jsonl_file_sink() {
        use dispatcher::SinkSpec;

        let dir = tempfile::tempdir().unwrap();

        let fusion = FusionConfig::for_sensors(["imu"]);
        let mut config = PipelineConfig::new(fusion);
        config.max_batches = Some(2);
        config.run_for = Some(Duration::from_secs(10));
        config.sinks = vec![SinkSpec::jsonl_file("file", dir.path())];

        let mut pipe = FusionPipeline::new(config);
        pipe.add_source(MockSensorSource::imu("imu", 100.0));
        pipe.run().await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);

        let path = entries[0].as_ref().unwrap().path();
        let contents = std::fs::read_to_string(path).unwrap();
        let mut last_id = None;
        for line in contents.lines() {
            let batch: contracts::FusionBatch = serde_json::from_str(line).unwrap();
            if let Some(last) = last_id {
                assert!(batch.window_id > last);
            }
            last_id = Some(batch.window_id);
        }
        assert!(last_id.is_some());
    }
}
