//! Real-time capture pipeline
//!
//! Two long-lived threads connected by a bounded [`FrameQueue`]:
//!
//! ```text
//! FrameSource ──► acquisition ──► FrameQueue ──► decoding ──► TimeSeriesStore
//!                 (timed receive)   (drop-oldest)  (timed dequeue)
//! ```
//!
//! Both stages block only inside a call bounded by the configured timeout and
//! check a shared cancel flag between calls, so `stop()` returns within one
//! timeout. Per-frame problems (short payloads, failing overrides, a full
//! queue) only bump counters; a source failure ends acquisition and marks the
//! pipeline failed, after which decoding drains what is queued and exits.

pub mod metrics;
pub mod queue;

pub use metrics::{CaptureMetrics, CaptureStats};
pub use queue::FrameQueue;

use crate::config::CaptureConfig;
use crate::decoder::Decoder;
use crate::source::FrameSource;
use crate::store::{FrameLog, TimeSeriesStore};
use crate::types::{CaptureError, Frame, Result, SourceError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle state reported by [`CapturePipeline::status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Never started
    Idle,
    Running,
    /// Stopped by the caller or finished after the source ran out
    Stopped,
    /// The frame source failed; carries the reason
    Failed(String),
}

/// Flags shared by the pipeline handle and both stages
#[derive(Debug, Default)]
struct StageControl {
    cancel: AtomicBool,
    acquisition_done: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl StageControl {
    fn reset(&self) {
        self.cancel.store(false, Ordering::Release);
        self.acquisition_done.store(false, Ordering::Release);
        *self.failure.lock() = None;
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn fail(&self, reason: String) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(reason);
        }
    }
}

struct Workers {
    acquisition: JoinHandle<()>,
    decoding: JoinHandle<()>,
}

impl Workers {
    fn is_finished(&self) -> bool {
        self.acquisition.is_finished() && self.decoding.is_finished()
    }

    fn join(self, control: &StageControl) {
        for (name, handle) in [("acquisition", self.acquisition), ("decoding", self.decoding)] {
            if handle.join().is_err() {
                log::error!("{} stage panicked", name);
                control.fail(format!("{} stage panicked", name));
            }
        }
    }
}

/// Everything the acquisition thread owns or shares
struct AcquisitionStage<S> {
    source: S,
    queue: Arc<FrameQueue>,
    metrics: Arc<CaptureMetrics>,
    control: Arc<StageControl>,
    config: CaptureConfig,
}

impl<S: FrameSource> AcquisitionStage<S> {
    fn run(mut self) {
        let timeout = self.config.receive_timeout();
        log::debug!("Acquisition stage started (timeout {:?})", timeout);

        loop {
            if self.control.is_cancelled() {
                log::debug!("Acquisition stage cancelled");
                break;
            }

            match self.source.receive(timeout) {
                Ok(frame) => self.admit(frame),
                Err(SourceError::Timeout) => continue,
                Err(SourceError::EndOfStream) => {
                    log::info!("Frame source exhausted");
                    break;
                }
                Err(e) => {
                    log::error!("Frame source failed, stopping acquisition: {}", e);
                    self.control.fail(e.to_string());
                    break;
                }
            }
        }

        self.source.disconnect();
        self.control.acquisition_done.store(true, Ordering::Release);
    }

    fn admit(&self, frame: Frame) {
        self.metrics.frames_received.fetch_add(1, Ordering::Relaxed);

        if !self.config.should_capture(frame.arbitration_id, frame.dlc()) {
            self.metrics.frames_filtered.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if let Some(evicted) = self.queue.push_evicting(frame) {
            let dropped = self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 || dropped % 1000 == 0 {
                log::warn!(
                    "Frame queue full (capacity {}), dropped oldest frame 0x{:X}; {} dropped so far",
                    self.queue.capacity(),
                    evicted.arbitration_id,
                    dropped
                );
            }
        }
    }
}

/// Everything the decoding thread shares
struct DecodingStage {
    queue: Arc<FrameQueue>,
    decoder: Arc<Decoder>,
    store: Arc<TimeSeriesStore>,
    frame_log: Arc<FrameLog>,
    metrics: Arc<CaptureMetrics>,
    control: Arc<StageControl>,
    timeout: Duration,
}

impl DecodingStage {
    fn run(self) {
        log::debug!("Decoding stage started (timeout {:?})", self.timeout);

        loop {
            if self.control.is_cancelled() {
                log::debug!("Decoding stage cancelled");
                break;
            }

            match self.queue.pop_timeout(self.timeout) {
                Some(frame) => self.process(frame),
                None => {
                    // Acquisition publishes its last frame before raising the flag
                    if self.control.acquisition_done.load(Ordering::Acquire) && self.queue.is_empty() {
                        log::debug!("Decoding stage drained");
                        break;
                    }
                }
            }
        }
    }

    fn process(&self, frame: Frame) {
        self.frame_log.record(frame);

        match self.decoder.decode_frame(&frame) {
            Ok(decoded) => {
                self.store
                    .append_values(frame.arbitration_id, frame.timestamp_ns, &decoded.values);
                if decoded.out_of_range > 0 {
                    self.metrics
                        .signal_warnings
                        .fetch_add(decoded.out_of_range as u64, Ordering::Relaxed);
                }
                self.metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let errors = self.metrics.decode_errors.fetch_add(1, Ordering::Relaxed) + 1;
                if errors == 1 || errors % 1000 == 0 {
                    log::warn!("{} ({} decode errors so far)", e, errors);
                } else {
                    log::debug!("{}", e);
                }
            }
        }
    }
}

/// Owns the frame queue and the two capture stages
pub struct CapturePipeline {
    config: CaptureConfig,
    decoder: Arc<Decoder>,
    store: Arc<TimeSeriesStore>,
    frame_log: Arc<FrameLog>,
    queue: Arc<FrameQueue>,
    metrics: Arc<CaptureMetrics>,
    control: Arc<StageControl>,
    workers: Option<Workers>,
    started: bool,
}

impl CapturePipeline {
    /// Create a pipeline with a fresh store sized from the configuration
    ///
    /// # Example
    /// ```
    /// use can_capture::{CaptureConfig, CapturePipeline, Decoder, PipelineState};
    /// use std::sync::Arc;
    ///
    /// let pipeline = CapturePipeline::new(CaptureConfig::new(), Arc::new(Decoder::new())).unwrap();
    /// assert_eq!(pipeline.status(), PipelineState::Idle);
    /// ```
    pub fn new(config: CaptureConfig, decoder: Arc<Decoder>) -> Result<Self> {
        let store = Arc::new(TimeSeriesStore::new(config.series_capacity));
        Self::with_store(config, decoder, store)
    }

    /// Create a pipeline writing into an existing store
    pub fn with_store(
        config: CaptureConfig,
        decoder: Arc<Decoder>,
        store: Arc<TimeSeriesStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            queue: Arc::new(FrameQueue::new(config.queue_capacity)),
            frame_log: Arc::new(FrameLog::new(config.frame_log_capacity)),
            metrics: Arc::new(CaptureMetrics::new()),
            control: Arc::new(StageControl::default()),
            workers: None,
            started: false,
            config,
            decoder,
            store,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn decoder(&self) -> &Arc<Decoder> {
        &self.decoder
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.store
    }

    pub fn frame_log(&self) -> &Arc<FrameLog> {
        &self.frame_log
    }

    /// Frames currently waiting for the decoding stage
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Connect the source and spawn both stages
    ///
    /// Fails with [`CaptureError::AlreadyRunning`] while stages are active.
    /// A pipeline whose stages have finished can be started again; counters
    /// keep accumulating across runs.
    pub fn start<S>(&mut self, mut source: S) -> Result<()>
    where
        S: FrameSource + 'static,
    {
        if let Some(workers) = &self.workers {
            if !workers.is_finished() {
                return Err(CaptureError::AlreadyRunning);
            }
        }
        if let Some(finished) = self.workers.take() {
            finished.join(&self.control);
        }

        source.connect(&self.config.bus)?;

        let stale = self.queue.clear();
        if stale > 0 {
            // Frames left behind by `stop()` count as dropped
            self.metrics
                .frames_dropped
                .fetch_add(stale as u64, Ordering::Relaxed);
            log::debug!("Discarded {} frames left from the previous run", stale);
        }
        self.control.reset();

        let acquisition = AcquisitionStage {
            source,
            queue: Arc::clone(&self.queue),
            metrics: Arc::clone(&self.metrics),
            control: Arc::clone(&self.control),
            config: self.config.clone(),
        };
        let acquisition = thread::Builder::new()
            .name("can-acquisition".to_string())
            .spawn(move || acquisition.run())?;

        let decoding = DecodingStage {
            queue: Arc::clone(&self.queue),
            decoder: Arc::clone(&self.decoder),
            store: Arc::clone(&self.store),
            frame_log: Arc::clone(&self.frame_log),
            metrics: Arc::clone(&self.metrics),
            control: Arc::clone(&self.control),
            timeout: self.config.dequeue_timeout(),
        };
        let decoding = match thread::Builder::new()
            .name("can-decoding".to_string())
            .spawn(move || decoding.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                self.control.cancel.store(true, Ordering::Release);
                if acquisition.join().is_err() {
                    log::error!("acquisition stage panicked");
                }
                return Err(e.into());
            }
        };

        self.workers = Some(Workers { acquisition, decoding });
        self.started = true;
        log::info!(
            "Capture pipeline started on {} (queue {}, series {})",
            self.config.bus.channel,
            self.queue.capacity(),
            self.store.capacity()
        );
        Ok(())
    }

    /// Cancel both stages and wait for them to exit
    ///
    /// Returns within roughly one receive timeout. Calling it again, or on a
    /// pipeline that never started, does nothing.
    pub fn stop(&mut self) {
        let Some(workers) = self.workers.take() else {
            return;
        };

        log::info!("Stopping capture pipeline");
        self.control.cancel.store(true, Ordering::Release);
        workers.join(&self.control);

        let stats = self.stats();
        log::info!(
            "Capture stopped: {} received, {} decoded, {} dropped, {} decode errors",
            stats.frames_received,
            stats.frames_decoded,
            stats.frames_dropped,
            stats.decode_errors
        );
    }

    /// Snapshot of the capture counters
    pub fn stats(&self) -> CaptureStats {
        self.metrics.snapshot()
    }

    pub fn status(&self) -> PipelineState {
        if let Some(reason) = self.control.failure.lock().clone() {
            return PipelineState::Failed(reason);
        }
        match &self.workers {
            Some(workers) if !workers.is_finished() => PipelineState::Running,
            Some(_) => PipelineState::Stopped,
            None if self.started => PipelineState::Stopped,
            None => PipelineState::Idle,
        }
    }

    /// `Ok` while running; the source failure or `NotRunning` otherwise
    pub fn ensure_running(&self) -> Result<()> {
        match self.status() {
            PipelineState::Running => Ok(()),
            PipelineState::Failed(reason) => Err(CaptureError::Source(SourceError::Disconnected(reason))),
            PipelineState::Idle | PipelineState::Stopped => Err(CaptureError::NotRunning),
        }
    }

    /// True when no stage is running (never started, stopped, or finished)
    pub fn is_finished(&self) -> bool {
        self.workers.as_ref().map_or(true, Workers::is_finished)
    }

    /// Wait until both stages have finished on their own
    ///
    /// Returns false if `timeout` elapsed first. Stages of a live bus never
    /// finish by themselves; use [`stop`](Self::stop) for those.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Drop all stored samples and logged frames (session reset)
    pub fn clear_data(&self) {
        self.store.clear();
        self.frame_log.clear();
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
