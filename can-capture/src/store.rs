//! Bounded time-series store
//!
//! Every (arbitration ID, signal name) pair gets its own ring buffer of
//! [`DecodedSample`]s, created on the first sample. All buffers share one
//! capacity; once full, the oldest sample is evicted on each append.
//!
//! Readers always receive copies. A snapshot is taken under the read lock, so
//! it never interleaves with an append.

use crate::types::{DecodedSample, Frame, SignalValues};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Identifies one time series
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SeriesKey {
    pub arbitration_id: u32,
    pub signal: String,
}

impl SeriesKey {
    pub fn new(arbitration_id: u32, signal: impl Into<String>) -> Self {
        Self {
            arbitration_id,
            signal: signal.into(),
        }
    }
}

type SeriesMap = HashMap<u32, HashMap<String, VecDeque<DecodedSample>>>;

/// Fixed-capacity per-signal sample buffers
pub struct TimeSeriesStore {
    capacity: usize,
    series: RwLock<SeriesMap>,
}

impl TimeSeriesStore {
    /// Create a store; a capacity of 0 is raised to 1
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn push(buffer: &mut VecDeque<DecodedSample>, capacity: usize, sample: DecodedSample) {
        if buffer.len() == capacity {
            buffer.pop_front();
        }
        buffer.push_back(sample);
    }

    /// Append one sample, evicting the oldest if the series is full
    pub fn append(&self, arbitration_id: u32, signal: &str, sample: DecodedSample) {
        let mut series = self.series.write();
        let signals = series.entry(arbitration_id).or_default();
        if let Some(buffer) = signals.get_mut(signal) {
            Self::push(buffer, self.capacity, sample);
        } else {
            let mut buffer = VecDeque::with_capacity(self.capacity.min(1024));
            buffer.push_back(sample);
            signals.insert(signal.to_string(), buffer);
        }
    }

    /// Append all values decoded from one frame under a single lock
    pub fn append_values(&self, arbitration_id: u32, timestamp_ns: u64, values: &SignalValues) {
        if values.is_empty() {
            return;
        }

        let mut series = self.series.write();
        let signals = series.entry(arbitration_id).or_default();
        for (name, &value) in values {
            let sample = DecodedSample::new(timestamp_ns, value);
            match signals.get_mut(name.as_str()) {
                Some(buffer) => Self::push(buffer, self.capacity, sample),
                None => {
                    let mut buffer = VecDeque::with_capacity(self.capacity.min(1024));
                    buffer.push_back(sample);
                    signals.insert(name.clone(), buffer);
                }
            }
        }
    }

    /// Copy of one series, oldest first; empty if the key is unknown
    pub fn snapshot(&self, arbitration_id: u32, signal: &str) -> Vec<DecodedSample> {
        self.series
            .read()
            .get(&arbitration_id)
            .and_then(|signals| signals.get(signal))
            .map(|buffer| buffer.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Copy of every series, sorted by key
    pub fn snapshot_all(&self) -> Vec<(SeriesKey, Vec<DecodedSample>)> {
        let series = self.series.read();
        let mut all: Vec<(SeriesKey, Vec<DecodedSample>)> = series
            .iter()
            .flat_map(|(&id, signals)| {
                signals.iter().map(move |(name, buffer)| {
                    (SeriesKey::new(id, name.clone()), buffer.iter().copied().collect())
                })
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Most recent sample of a series
    pub fn latest(&self, arbitration_id: u32, signal: &str) -> Option<DecodedSample> {
        self.series
            .read()
            .get(&arbitration_id)
            .and_then(|signals| signals.get(signal))
            .and_then(|buffer| buffer.back().copied())
    }

    /// All known series keys, sorted
    pub fn keys(&self) -> Vec<SeriesKey> {
        let series = self.series.read();
        let mut keys: Vec<SeriesKey> = series
            .iter()
            .flat_map(|(&id, signals)| signals.keys().map(move |name| SeriesKey::new(id, name.clone())))
            .collect();
        keys.sort();
        keys
    }

    /// Number of samples held for a series
    pub fn len(&self, arbitration_id: u32, signal: &str) -> usize {
        self.series
            .read()
            .get(&arbitration_id)
            .and_then(|signals| signals.get(signal))
            .map_or(0, VecDeque::len)
    }

    /// Number of samples across all series
    pub fn total_samples(&self) -> usize {
        self.series
            .read()
            .values()
            .flat_map(|signals| signals.values())
            .map(VecDeque::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples() == 0
    }

    /// Drop every series (session reset)
    pub fn clear(&self) {
        self.series.write().clear();
    }

    /// Drop one series; returns false if it did not exist
    pub fn clear_series(&self, arbitration_id: u32, signal: &str) -> bool {
        let mut series = self.series.write();
        let Some(signals) = series.get_mut(&arbitration_id) else {
            return false;
        };
        let removed = signals.remove(signal).is_some();
        if signals.is_empty() {
            series.remove(&arbitration_id);
        }
        removed
    }
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SERIES_CAPACITY)
    }
}

/// Bounded log of the most recently decoded raw frames
///
/// Feeds raw-frame export for live sessions. A capacity of 0 disables it.
pub struct FrameLog {
    capacity: usize,
    frames: Mutex<VecDeque<Frame>>,
}

impl FrameLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            frames: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, frame: Frame) {
        if self.capacity == 0 {
            return;
        }
        let mut frames = self.frames.lock();
        if frames.len() == self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    /// Copy of the logged frames, oldest first
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}
