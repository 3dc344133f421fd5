//! Capture configuration types
//!
//! This module defines the tunables of the capture pipeline: queue and store
//! bounds, the polling timeouts that bound shutdown latency, the bus settings
//! handed to the frame source, and optional acquisition filters.

use crate::source::BusSettings;
use crate::types::{CaptureError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Frames held between acquisition and decoding before the oldest is dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Samples kept per (ID, signal) series
pub const DEFAULT_SERIES_CAPACITY: usize = 1_000;

/// Raw frames kept for export
pub const DEFAULT_FRAME_LOG_CAPACITY: usize = 10_000;

/// Receive/dequeue timeout; also the worst-case latency of `stop()`.
/// Shorter values stop faster at the cost of more idle wake-ups.
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 100;

/// Configuration for the capture pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,

    /// Raw frames retained for export (0 disables the frame log)
    #[serde(default = "default_frame_log_capacity")]
    pub frame_log_capacity: usize,

    #[serde(default = "default_timeout_ms")]
    pub receive_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub dequeue_timeout_ms: u64,

    #[serde(default)]
    pub bus: BusSettings,

    /// Optional: only capture these arbitration IDs
    #[serde(default)]
    pub id_filter: Option<Vec<u32>>,

    /// Optional: drop frames shorter than this
    #[serde(default)]
    pub min_dlc: Option<usize>,

    /// Optional: drop frames longer than this
    #[serde(default)]
    pub max_dlc: Option<usize>,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_series_capacity() -> usize {
    DEFAULT_SERIES_CAPACITY
}

fn default_frame_log_capacity() -> usize {
    DEFAULT_FRAME_LOG_CAPACITY
}

fn default_timeout_ms() -> u64 {
    DEFAULT_RECEIVE_TIMEOUT_MS
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            series_capacity: DEFAULT_SERIES_CAPACITY,
            frame_log_capacity: DEFAULT_FRAME_LOG_CAPACITY,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            dequeue_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            bus: BusSettings::default(),
            id_filter: None,
            min_dlc: None,
            max_dlc: None,
        }
    }
}

impl CaptureConfig {
    /// Create a new capture configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the frame queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Builder method: set the per-series sample capacity
    pub fn with_series_capacity(mut self, capacity: usize) -> Self {
        self.series_capacity = capacity;
        self
    }

    /// Builder method: set the raw frame log capacity
    pub fn with_frame_log_capacity(mut self, capacity: usize) -> Self {
        self.frame_log_capacity = capacity;
        self
    }

    /// Builder method: set both polling timeouts
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_millis() as u64;
        self.receive_timeout_ms = ms;
        self.dequeue_timeout_ms = ms;
        self
    }

    /// Builder method: set bus settings passed to the frame source
    pub fn with_bus(mut self, bus: BusSettings) -> Self {
        self.bus = bus;
        self
    }

    /// Builder method: only capture the given IDs
    pub fn with_id_filter(mut self, ids: Vec<u32>) -> Self {
        self.id_filter = Some(ids);
        self
    }

    /// Builder method: accepted DLC range (inclusive)
    pub fn with_dlc_range(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_dlc = min;
        self.max_dlc = max;
        self
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    /// Check the configuration before a pipeline is built from it
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(CaptureError::InvalidConfig("queue_capacity must be at least 1".to_string()));
        }
        if self.series_capacity == 0 {
            return Err(CaptureError::InvalidConfig("series_capacity must be at least 1".to_string()));
        }
        if self.receive_timeout_ms == 0 || self.dequeue_timeout_ms == 0 {
            return Err(CaptureError::InvalidConfig("timeouts must be at least 1 ms".to_string()));
        }
        if let (Some(min), Some(max)) = (self.min_dlc, self.max_dlc) {
            if min > max {
                return Err(CaptureError::InvalidConfig(format!(
                    "min_dlc {} is greater than max_dlc {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Check if a message ID should be captured
    pub fn should_capture_id(&self, arbitration_id: u32) -> bool {
        match &self.id_filter {
            Some(ids) => ids.contains(&arbitration_id),
            None => true,
        }
    }

    /// Check if a data length should be captured
    pub fn should_capture_dlc(&self, dlc: usize) -> bool {
        self.min_dlc.map_or(true, |min| dlc >= min) && self.max_dlc.map_or(true, |max| dlc <= max)
    }

    /// Check if a frame should be captured based on filters
    pub fn should_capture(&self, arbitration_id: u32, dlc: usize) -> bool {
        self.should_capture_id(arbitration_id) && self.should_capture_dlc(dlc)
    }
}
