//! Core types for the capture library
//!
//! This module defines the frame value that flows through the pipeline, the
//! decoded sample that lands in the time-series store, and the error taxonomy
//! shared by every stage.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp type used for display and export
pub type Timestamp = DateTime<Utc>;

/// Result type for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Decoded signal values of one frame, keyed by signal name
pub type SignalValues = BTreeMap<String, f64>;

/// Maximum payload length of a classic CAN frame
pub const MAX_PAYLOAD_LEN: usize = 8;

/// Highest 11-bit (standard) arbitration ID
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Highest 29-bit (extended) arbitration ID
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// A raw CAN frame as delivered by a frame source
///
/// The payload is stored inline so a frame is `Copy` and the 8-byte bound is
/// enforced by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Timestamp in nanoseconds (source clock, non-decreasing per source)
    pub timestamp_ns: u64,
    /// CAN arbitration ID (11-bit or 29-bit)
    pub arbitration_id: u32,
    /// True if this frame uses a 29-bit ID
    pub is_extended: bool,
    data: [u8; MAX_PAYLOAD_LEN],
    len: u8,
}

impl Frame {
    /// Create a frame, inferring the extended flag from the ID range
    ///
    /// Fails with [`CaptureError::InvalidFrame`] if the payload is longer than
    /// 8 bytes or the ID does not fit in 29 bits.
    pub fn new(arbitration_id: u32, payload: &[u8], timestamp_ns: u64) -> Result<Self> {
        Self::with_id_kind(arbitration_id, arbitration_id > MAX_STANDARD_ID, payload, timestamp_ns)
    }

    /// Create a frame with an explicit standard/extended ID kind
    pub fn with_id_kind(
        arbitration_id: u32,
        is_extended: bool,
        payload: &[u8],
        timestamp_ns: u64,
    ) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(CaptureError::InvalidFrame(format!(
                "payload of {} bytes exceeds {} bytes (ID 0x{:X})",
                payload.len(),
                MAX_PAYLOAD_LEN,
                arbitration_id
            )));
        }

        let max_id = if is_extended { MAX_EXTENDED_ID } else { MAX_STANDARD_ID };
        if arbitration_id > max_id {
            return Err(CaptureError::InvalidFrame(format!(
                "ID 0x{:X} out of range for {} frame",
                arbitration_id,
                if is_extended { "extended" } else { "standard" }
            )));
        }

        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            timestamp_ns,
            arbitration_id,
            is_extended,
            data,
            len: payload.len() as u8,
        })
    }

    /// The valid payload bytes (`dlc()` bytes long)
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.len as usize
    }

    /// Convert timestamp from nanoseconds to DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        timestamp_from_ns(self.timestamp_ns)
    }

    /// Payload as uppercase hex without separators (e.g. `03D705EC`)
    pub fn payload_hex(&self) -> String {
        hex::encode_upper(self.payload())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended {
            write!(f, "{:08X}#{}", self.arbitration_id, self.payload_hex())
        } else {
            write!(f, "{:03X}#{}", self.arbitration_id, self.payload_hex())
        }
    }
}

/// Convert a nanosecond timestamp into a UTC date-time
pub fn timestamp_from_ns(timestamp_ns: u64) -> Timestamp {
    let secs = (timestamp_ns / 1_000_000_000) as i64;
    let nsecs = (timestamp_ns % 1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nsecs).unwrap_or_default()
}

/// One decoded value of a signal at a point in time
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecodedSample {
    /// Timestamp of the frame the value was decoded from (nanoseconds)
    pub timestamp_ns: u64,
    /// Physical value after scale and offset
    pub value: f64,
}

impl DecodedSample {
    pub fn new(timestamp_ns: u64, value: f64) -> Self {
        Self { timestamp_ns, value }
    }

    pub fn timestamp(&self) -> Timestamp {
        timestamp_from_ns(self.timestamp_ns)
    }
}

/// Errors reported by a frame source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No frame arrived within the receive timeout (not a failure)
    #[error("Receive timeout")]
    Timeout,

    /// A finite source has delivered all of its frames
    #[error("End of stream")]
    EndOfStream,

    #[error("Source not connected")]
    NotConnected,

    #[error("Bus disconnected: {0}")]
    Disconnected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while configuring, decoding or capturing
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Invalid signal definition: {0}")]
    InvalidDefinition(String),

    #[error("Signal '{signal}' needs {required} bytes but frame only has {available}")]
    OutOfRange {
        signal: String,
        required: usize,
        available: usize,
    },

    #[error("Decode failed for CAN ID 0x{arbitration_id:X}: {message}")]
    DecodeError { arbitration_id: u32, message: String },

    #[error("Frame source error: {0}")]
    Source(#[from] SourceError),

    #[error("Capture pipeline is already running")]
    AlreadyRunning,

    #[error("Capture pipeline is not running")]
    NotRunning,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse log file: {0}")]
    LogParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_payload_bound() {
        let frame = Frame::new(0x259, &[0x03, 0xD7], 0).unwrap();
        assert_eq!(frame.dlc(), 2);
        assert_eq!(frame.payload(), &[0x03, 0xD7]);
        assert!(!frame.is_extended);

        let too_long = Frame::new(0x259, &[0u8; 9], 0);
        assert!(matches!(too_long, Err(CaptureError::InvalidFrame(_))));
    }

    #[test]
    fn test_frame_id_kind() {
        let frame = Frame::new(0x18FF_0001, &[], 0).unwrap();
        assert!(frame.is_extended);
        assert_eq!(frame.dlc(), 0);

        assert!(Frame::with_id_kind(0x800, false, &[], 0).is_err());
        assert!(Frame::new(0x2000_0000, &[], 0).is_err());
    }

    #[test]
    fn test_frame_display() {
        let frame = Frame::new(0x25E, &[0xEC, 0x05], 0).unwrap();
        assert_eq!(frame.to_string(), "25E#EC05");

        let ext = Frame::new(0x18DA_F110, &[0x01], 0).unwrap();
        assert_eq!(ext.to_string(), "18DAF110#01");
    }

    #[test]
    fn test_timestamp_conversion() {
        let frame = Frame::new(0x100, &[], 1_700_000_000_123_456_789).unwrap();
        let ts = frame.timestamp();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_nanos(), 123_456_789);
    }
}
