//! Replay of recorded frames
//!
//! Delivers a recorded frame sequence in order, then reports end of stream.
//! With real-time pacing enabled, frames are released according to the gaps
//! between their timestamps, and a receive that would wait longer than its
//! timeout returns [`SourceError::Timeout`] like an idle bus.

use super::{BusSettings, FrameSource};
use crate::formats::dumplog;
use crate::types::{Frame, Result, SourceError};
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};

pub struct ReplaySource {
    frames: VecDeque<Frame>,
    connected: bool,
    realtime: bool,
    /// Wall-clock instant matched to the first replayed timestamp
    anchor: Option<(Instant, u64)>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            connected: false,
            realtime: false,
            anchor: None,
        }
    }

    /// Load a dump log (`(ts) channel ID#DATA` lines)
    pub fn from_dump_log(path: &Path) -> Result<Self> {
        let frames = dumplog::read_dump_log(path)?;
        log::info!("Loaded {} frames for replay from {:?}", frames.len(), path);
        Ok(Self::new(frames))
    }

    /// Builder method: pace frames by their timestamps
    pub fn with_realtime(mut self, enabled: bool) -> Self {
        self.realtime = enabled;
        self
    }

    /// Frames not yet delivered
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Time to wait before the next frame is due (zero when not pacing)
    fn wait_for(&mut self, next: &Frame) -> Duration {
        if !self.realtime {
            return Duration::ZERO;
        }
        let (start, first_ns) = *self
            .anchor
            .get_or_insert_with(|| (Instant::now(), next.timestamp_ns));
        let due = start + Duration::from_nanos(next.timestamp_ns.saturating_sub(first_ns));
        due.saturating_duration_since(Instant::now())
    }
}

impl FrameSource for ReplaySource {
    fn connect(&mut self, settings: &BusSettings) -> std::result::Result<(), SourceError> {
        log::info!(
            "Replaying {} frames as {} ({})",
            self.frames.len(),
            settings.channel,
            if self.realtime { "real time" } else { "as fast as possible" }
        );
        self.connected = true;
        self.anchor = None;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> std::result::Result<Frame, SourceError> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }
        let Some(next) = self.frames.front().copied() else {
            return Err(SourceError::EndOfStream);
        };

        let wait = self.wait_for(&next);
        if wait > timeout {
            std::thread::sleep(timeout);
            return Err(SourceError::Timeout);
        }
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }

        self.frames.pop_front();
        Ok(next)
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames() -> Vec<Frame> {
        (0..3u64)
            .map(|i| Frame::new(0x259, &[i as u8], i * 1_000_000).unwrap())
            .collect()
    }

    #[test]
    fn test_replay_in_order_then_end() {
        let mut source = ReplaySource::new(frames());
        assert!(matches!(source.receive(Duration::ZERO), Err(SourceError::NotConnected)));

        source.connect(&BusSettings::default()).unwrap();
        for i in 0..3u8 {
            let frame = source.receive(Duration::from_millis(10)).unwrap();
            assert_eq!(frame.payload(), &[i]);
        }
        assert!(matches!(
            source.receive(Duration::from_millis(10)),
            Err(SourceError::EndOfStream)
        ));
    }

    #[test]
    fn test_realtime_pacing_times_out() {
        // Second frame is due 10 s after the first
        let frames = vec![
            Frame::new(0x100, &[], 0).unwrap(),
            Frame::new(0x100, &[], 10_000_000_000).unwrap(),
        ];
        let mut source = ReplaySource::new(frames).with_realtime(true);
        source.connect(&BusSettings::default()).unwrap();

        assert!(source.receive(Duration::from_millis(5)).is_ok());
        assert!(matches!(
            source.receive(Duration::from_millis(5)),
            Err(SourceError::Timeout)
        ));
        assert_eq!(source.remaining(), 1);
    }
}
