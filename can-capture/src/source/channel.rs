//! Channel-backed frame source
//!
//! Frames are produced elsewhere (a driver thread, an FFI callback, a test)
//! and handed over through a crossbeam channel.

use super::{BusSettings, FrameSource};
use crate::types::{Frame, SourceError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

pub struct ChannelSource {
    rx: Receiver<Frame>,
    connected: bool,
}

impl ChannelSource {
    pub fn new(rx: Receiver<Frame>) -> Self {
        Self { rx, connected: false }
    }

    /// Create a source and the sender that feeds it
    ///
    /// `capacity` bounds the hand-over channel; `None` makes it unbounded.
    pub fn channel(capacity: Option<usize>) -> (Sender<Frame>, Self) {
        let (tx, rx) = match capacity {
            Some(cap) => crossbeam_channel::bounded(cap),
            None => crossbeam_channel::unbounded(),
        };
        (tx, Self::new(rx))
    }
}

impl FrameSource for ChannelSource {
    fn connect(&mut self, settings: &BusSettings) -> Result<(), SourceError> {
        log::info!(
            "Channel source attached as {} on {} ({} bit/s)",
            settings.interface,
            settings.channel,
            settings.bitrate
        );
        self.connected = true;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Frame, SourceError> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Err(SourceError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(SourceError::Disconnected("frame channel closed".to_string()))
            }
        }
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_requires_connect() {
        let (_tx, mut source) = ChannelSource::channel(Some(4));
        assert!(matches!(
            source.receive(Duration::from_millis(1)),
            Err(SourceError::NotConnected)
        ));
    }

    #[test]
    fn test_timeout_then_frame_then_disconnect() {
        let (tx, mut source) = ChannelSource::channel(None);
        source.connect(&BusSettings::default()).unwrap();

        assert!(matches!(source.receive(Duration::from_millis(5)), Err(SourceError::Timeout)));

        tx.send(Frame::new(0x100, &[1], 1).unwrap()).unwrap();
        let frame = source.receive(Duration::from_millis(5)).unwrap();
        assert_eq!(frame.arbitration_id, 0x100);

        drop(tx);
        assert!(matches!(
            source.receive(Duration::from_millis(5)),
            Err(SourceError::Disconnected(_))
        ));
    }
}
