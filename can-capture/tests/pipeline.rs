//! End-to-end tests of the capture pipeline

use can_capture::{
    CaptureConfig, CaptureError, CapturePipeline, ChannelSource, DataType, Decoder, Frame,
    PipelineState, ReplaySource, SignalCatalog, SignalDefinition, SignalValues,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fast_config() -> CaptureConfig {
    CaptureConfig::new().with_timeout(Duration::from_millis(10))
}

fn default_decoder() -> Arc<Decoder> {
    let decoder = Arc::new(Decoder::new());
    SignalCatalog::defaults().apply(&decoder).unwrap();
    decoder
}

/// Frames 0x259 / 0x25E as sent by the analog input module
fn module_frames(count: u64) -> Vec<Frame> {
    (0..count)
        .map(|i| {
            let id = if i % 2 == 0 { 0x259 } else { 0x25E };
            Frame::new(id, &[0x03, 0xD7, 0x05, 0xEC, 0x06, 0xB9, 0x00, 0x00], i * 1_000_000).unwrap()
        })
        .collect()
}

#[test]
fn test_replay_decodes_default_catalog() {
    init_logging();
    let mut pipeline = CapturePipeline::new(fast_config(), default_decoder()).unwrap();
    pipeline.start(ReplaySource::new(module_frames(100))).unwrap();
    assert!(pipeline.wait(Duration::from_secs(5)));
    pipeline.stop();

    let stats = pipeline.stats();
    assert_eq!(stats.frames_received, 100);
    assert_eq!(stats.frames_decoded, 100);
    assert_eq!(stats.frames_dropped, 0);
    assert_eq!(pipeline.status(), PipelineState::Stopped);

    let store = pipeline.store();
    assert_eq!(store.len(0x259, "analog_voltage_in1"), 50);
    let latest = store.latest(0x25E, "internal_voltage").unwrap();
    assert!((latest.value - 60.421).abs() < 1e-9);
    assert_eq!(latest.timestamp_ns, 99_000_000);
    assert!((store.latest(0x25E, "temperature").unwrap().value - 47.366).abs() < 1e-9);
    assert_eq!(pipeline.frame_log().len(), 100);
}

#[test]
fn test_unknown_ids_produce_no_samples() {
    init_logging();
    let frames: Vec<Frame> = (0..20u64)
        .map(|i| Frame::new(0x7FF, &[1, 2, 3, 4], i).unwrap())
        .collect();
    let mut pipeline = CapturePipeline::new(fast_config(), default_decoder()).unwrap();
    pipeline.start(ReplaySource::new(frames)).unwrap();
    assert!(pipeline.wait(Duration::from_secs(5)));

    assert!(pipeline.store().keys().is_empty());
    assert_eq!(pipeline.stats().frames_decoded, 20);
    assert_eq!(pipeline.stats().decode_errors, 0);
}

#[test]
fn test_full_queue_drops_oldest() {
    init_logging();
    let decoder = Arc::new(Decoder::new());
    decoder.register_override(0x100, |payload: &[u8]| {
        thread::sleep(Duration::from_millis(2));
        let mut values = SignalValues::new();
        values.insert("seq".to_string(), payload[0] as f64);
        Ok(values)
    });

    let config = fast_config().with_queue_capacity(8).with_series_capacity(10_000);
    let mut pipeline = CapturePipeline::new(config, decoder).unwrap();
    let (tx, source) = ChannelSource::channel(None);
    pipeline.start(source).unwrap();

    let mut last_dropped = 0;
    for i in 0..500u64 {
        tx.send(Frame::new(0x100, &[(i % 256) as u8], i).unwrap()).unwrap();
        if i % 50 == 0 {
            let dropped = pipeline.stats().frames_dropped;
            assert!(dropped >= last_dropped);
            last_dropped = dropped;
        }
    }
    assert!(pipeline.queue_len() <= 8);

    // Give acquisition time to take everything off the channel
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.stats().frames_received < 500 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    let started = Instant::now();
    pipeline.stop();
    assert!(started.elapsed() < Duration::from_secs(2));

    let stats = pipeline.stats();
    assert_eq!(stats.frames_received, 500);
    assert!(stats.frames_dropped > 0);
    // Every received frame is accounted for exactly once
    assert_eq!(
        stats.frames_received,
        stats.frames_filtered
            + stats.frames_dropped
            + stats.frames_decoded
            + stats.decode_errors
            + pipeline.queue_len() as u64
    );

    // Surviving samples keep their order
    let samples = pipeline.store().snapshot(0x100, "seq");
    assert_eq!(samples.len() as u64, stats.frames_decoded);
    assert!(samples.windows(2).all(|w| w[0].timestamp_ns < w[1].timestamp_ns));
}

#[test]
fn test_stop_is_idempotent() {
    init_logging();
    let mut pipeline = CapturePipeline::new(fast_config(), default_decoder()).unwrap();
    let (tx, source) = ChannelSource::channel(None);
    pipeline.start(source).unwrap();
    assert_eq!(pipeline.status(), PipelineState::Running);
    assert!(pipeline.ensure_running().is_ok());

    for frame in module_frames(10) {
        tx.send(frame).unwrap();
    }
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.stats().frames_decoded < 10 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    pipeline.stop();
    let stats = pipeline.stats();
    pipeline.stop();
    assert_eq!(pipeline.stats(), stats);
    assert_eq!(pipeline.status(), PipelineState::Stopped);
    assert!(matches!(pipeline.ensure_running(), Err(CaptureError::NotRunning)));

    // Frames sent after stop are never observed
    let _ = tx.send(Frame::new(0x259, &[0, 0], 0).unwrap());
    thread::sleep(Duration::from_millis(30));
    assert_eq!(pipeline.stats().frames_received, stats.frames_received);
}

#[test]
fn test_second_start_rejected() {
    init_logging();
    let mut pipeline = CapturePipeline::new(fast_config(), default_decoder()).unwrap();
    let (_tx, source) = ChannelSource::channel(None);
    pipeline.start(source).unwrap();

    let (_tx2, other) = ChannelSource::channel(None);
    assert!(matches!(pipeline.start(other), Err(CaptureError::AlreadyRunning)));
    pipeline.stop();
}

#[test]
fn test_source_disconnect_fails_pipeline() {
    init_logging();
    let mut pipeline = CapturePipeline::new(fast_config(), default_decoder()).unwrap();
    let (tx, source) = ChannelSource::channel(None);
    pipeline.start(source).unwrap();

    for frame in module_frames(4) {
        tx.send(frame).unwrap();
    }
    drop(tx);

    assert!(pipeline.wait(Duration::from_secs(5)));
    assert!(matches!(pipeline.status(), PipelineState::Failed(_)));
    assert!(matches!(
        pipeline.ensure_running(),
        Err(CaptureError::Source(_))
    ));
    // Frames queued before the failure are still decoded
    assert_eq!(pipeline.stats().frames_decoded, 4);
    pipeline.stop();
}

#[test]
fn test_restart_after_finish() {
    init_logging();
    let mut pipeline = CapturePipeline::new(fast_config(), default_decoder()).unwrap();
    pipeline.start(ReplaySource::new(module_frames(10))).unwrap();
    assert!(pipeline.wait(Duration::from_secs(5)));

    pipeline.start(ReplaySource::new(module_frames(10))).unwrap();
    assert!(pipeline.wait(Duration::from_secs(5)));
    pipeline.stop();

    // Counters accumulate across runs
    assert_eq!(pipeline.stats().frames_received, 20);
}

#[test]
fn test_filters_applied_before_queue() {
    init_logging();
    let config = fast_config()
        .with_id_filter(vec![0x259])
        .with_dlc_range(Some(2), None);
    let mut frames = module_frames(10);
    frames.push(Frame::new(0x259, &[0x01], 100).unwrap());

    let mut pipeline = CapturePipeline::new(config, default_decoder()).unwrap();
    pipeline.start(ReplaySource::new(frames)).unwrap();
    assert!(pipeline.wait(Duration::from_secs(5)));

    let stats = pipeline.stats();
    assert_eq!(stats.frames_received, 11);
    assert_eq!(stats.frames_filtered, 6);
    assert_eq!(stats.frames_decoded, 5);
    assert!(pipeline.store().keys().iter().all(|key| key.arbitration_id == 0x259));
}

#[test]
fn test_short_payload_counts_warnings() {
    init_logging();
    let frames = vec![Frame::new(0x25E, &[0x03, 0xD7, 0x05], 0).unwrap()];
    let decoder = default_decoder();
    let mut pipeline = CapturePipeline::new(fast_config(), Arc::clone(&decoder)).unwrap();
    pipeline.start(ReplaySource::new(frames)).unwrap();
    assert!(pipeline.wait(Duration::from_secs(5)));

    // internal_voltage needs bytes 2..4, temperature bytes 4..6
    assert_eq!(pipeline.stats().signal_warnings, 2);
    assert_eq!(decoder.out_of_range_count(), 2);
    assert!(pipeline.store().is_empty());
}

#[test]
fn test_registry_changes_while_running() {
    init_logging();
    let decoder = Arc::new(Decoder::new());
    let mut pipeline = CapturePipeline::new(fast_config(), Arc::clone(&decoder)).unwrap();
    let (tx, source) = ChannelSource::channel(None);
    pipeline.start(source).unwrap();

    tx.send(Frame::new(0x300, &[10, 0], 1).unwrap()).unwrap();
    decoder
        .register(0x300, SignalDefinition::from_data_type("level", 0, DataType::Uint16Le))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut ts = 2;
    while pipeline.store().latest(0x300, "level").is_none() && Instant::now() < deadline {
        tx.send(Frame::new(0x300, &[10, 0], ts).unwrap()).unwrap();
        ts += 1;
        thread::sleep(Duration::from_millis(5));
    }
    pipeline.stop();

    assert_eq!(pipeline.store().latest(0x300, "level").unwrap().value, 10.0);
}

#[test]
fn test_restart_accounts_for_discarded_frames() {
    init_logging();
    let decoder = Arc::new(Decoder::new());
    decoder.register_override(0x100, |_: &[u8]| {
        thread::sleep(Duration::from_millis(50));
        Ok(SignalValues::new())
    });

    let mut pipeline = CapturePipeline::new(fast_config(), decoder).unwrap();
    let (tx, source) = ChannelSource::channel(None);
    pipeline.start(source).unwrap();
    for i in 0..30u64 {
        tx.send(Frame::new(0x100, &[i as u8], i).unwrap()).unwrap();
    }
    let deadline = Instant::now() + Duration::from_secs(5);
    while pipeline.stats().frames_received < 30 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    pipeline.stop();

    let accounted = |pipeline: &CapturePipeline| {
        let stats = pipeline.stats();
        stats.frames_filtered
            + stats.frames_dropped
            + stats.frames_decoded
            + stats.decode_errors
            + pipeline.queue_len() as u64
    };
    assert_eq!(pipeline.stats().frames_received, 30);
    assert!(pipeline.queue_len() > 0);
    assert_eq!(accounted(&pipeline), 30);

    // Restarting discards the leftover frames; they must show up as dropped
    pipeline.start(ReplaySource::new(Vec::new())).unwrap();
    assert!(pipeline.wait(Duration::from_secs(5)));
    pipeline.stop();

    assert_eq!(pipeline.queue_len(), 0);
    assert_eq!(pipeline.stats().frames_received, 30);
    assert_eq!(accounted(&pipeline), 30);
}
