//! Frame sources
//!
//! A [`FrameSource`] is the boundary to the physical bus transport. The
//! pipeline only needs a blocking receive with a timeout, so that its
//! acquisition stage can observe cancellation between receives.
//!
//! Two sources ship with the library:
//! - [`ReplaySource`]: replays a recorded sequence (e.g. a dump log)
//! - [`ChannelSource`]: frames pushed from another thread, the hook for a
//!   hardware driver

use crate::types::{Frame, SourceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod channel;
pub mod replay;

pub use channel::ChannelSource;
pub use replay::ReplaySource;

/// Connection parameters handed to a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSettings {
    /// Interface kind (socketcan, slcan, usb2can, ...)
    #[serde(default = "default_interface")]
    pub interface: String,
    /// Channel/device name
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Bus bitrate in bit/s
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
}

fn default_interface() -> String {
    "socketcan".to_string()
}

fn default_channel() -> String {
    "can0".to_string()
}

fn default_bitrate() -> u32 {
    500_000
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            channel: default_channel(),
            bitrate: default_bitrate(),
        }
    }
}

impl BusSettings {
    pub fn new(interface: impl Into<String>, channel: impl Into<String>, bitrate: u32) -> Self {
        Self {
            interface: interface.into(),
            channel: channel.into(),
            bitrate,
        }
    }
}

/// A blocking source of timestamped frames
///
/// `receive` returns [`SourceError::Timeout`] when nothing arrived within
/// `timeout` and [`SourceError::EndOfStream`] when a finite source is
/// exhausted. Every other error is treated as a lost bus link.
pub trait FrameSource: Send {
    fn connect(&mut self, settings: &BusSettings) -> Result<(), SourceError>;

    fn receive(&mut self, timeout: Duration) -> Result<Frame, SourceError>;

    fn disconnect(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self, settings: &BusSettings) -> Result<(), SourceError> {
        (**self).connect(settings)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Frame, SourceError> {
        (**self).receive(timeout)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}
