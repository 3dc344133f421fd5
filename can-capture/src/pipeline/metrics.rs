//! Capture counters
//!
//! All counters only ever increase and are updated with relaxed atomics, so
//! they can be read from any thread while the stages run.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CaptureMetrics {
    /// Frames delivered by the source (before filtering)
    pub frames_received: AtomicU64,
    /// Frames rejected by the ID/DLC filters
    pub frames_filtered: AtomicU64,
    /// Frames evicted from a full queue
    pub frames_dropped: AtomicU64,
    /// Frames that went through the decoder without error
    pub frames_decoded: AtomicU64,
    /// Frames whose override decode failed
    pub decode_errors: AtomicU64,
    /// Signals skipped because the payload was too short
    pub signal_warnings: AtomicU64,
}

impl CaptureMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_filtered: self.frames_filtered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            signal_warnings: self.signal_warnings.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the capture counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CaptureStats {
    pub frames_received: u64,
    pub frames_filtered: u64,
    pub frames_dropped: u64,
    pub frames_decoded: u64,
    pub decode_errors: u64,
    pub signal_warnings: u64,
}

impl CaptureStats {
    /// Dropped frames as a percentage of received frames
    pub fn drop_rate(&self) -> f64 {
        if self.frames_received == 0 {
            return 0.0;
        }
        (self.frames_dropped as f64 / self.frames_received as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_drop_rate() {
        let metrics = CaptureMetrics::new();
        assert_eq!(metrics.snapshot().drop_rate(), 0.0);

        metrics.frames_received.fetch_add(200, Ordering::Relaxed);
        metrics.frames_dropped.fetch_add(50, Ordering::Relaxed);
        let stats = metrics.snapshot();
        assert_eq!(stats.frames_received, 200);
        assert_eq!(stats.frames_dropped, 50);
        assert_eq!(stats.drop_rate(), 25.0);
    }
}
