//! CAN Capture Library
//!
//! Decodes physical signal values out of raw CAN frames and runs a two-stage
//! real-time capture pipeline that feeds bounded per-signal time series.
//!
//! # Architecture
//!
//! - [`Decoder`]: per-ID signal definitions (byte offset, width, signedness,
//!   byte order, scale, offset) and optional custom override functions
//! - [`CapturePipeline`]: an acquisition thread reading a [`FrameSource`] into
//!   a bounded drop-oldest queue, and a decoding thread writing samples into
//!   the [`TimeSeriesStore`]
//! - [`formats`]: dump-log replay input, plus CSV/JSON/dump-log export
//!
//! The library does NOT talk to hardware. Bus drivers implement
//! [`FrameSource`]; [`ChannelSource`] and [`ReplaySource`] cover in-process
//! producers and recorded logs.
//!
//! # Example Usage
//!
//! ```no_run
//! use can_capture::{CaptureConfig, CapturePipeline, Decoder, ReplaySource, SignalCatalog};
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! // Register the built-in signal set
//! let decoder = Arc::new(Decoder::new());
//! SignalCatalog::defaults().apply(&decoder).unwrap();
//!
//! // Replay a recorded log through the pipeline
//! let source = ReplaySource::from_dump_log(Path::new("capture.log")).unwrap();
//! let mut pipeline = CapturePipeline::new(CaptureConfig::new(), decoder).unwrap();
//! pipeline.start(source).unwrap();
//! pipeline.wait(Duration::from_secs(10));
//! pipeline.stop();
//!
//! if let Some(sample) = pipeline.store().latest(0x25E, "temperature") {
//!     println!("temperature = {} at {}", sample.value, sample.timestamp());
//! }
//! println!("{:?}", pipeline.stats());
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod formats;
pub mod pipeline;
pub mod signals;
pub mod source;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::CaptureConfig;
pub use decoder::{DecodeRule, DecodedFrame, Decoder, DecoderStats, OverrideError, OverrideFn};
pub use formats::ExportFormat;
pub use pipeline::{CapturePipeline, CaptureStats, PipelineState};
pub use signals::{ByteOrder, DataType, SignalCatalog, SignalConfig, SignalDefinition, Signedness};
pub use source::{BusSettings, ChannelSource, FrameSource, ReplaySource};
pub use store::{FrameLog, SeriesKey, TimeSeriesStore};
pub use types::{
    CaptureError, DecodedSample, Frame, Result, SignalValues, SourceError, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty decoder decodes nothing
        let decoder = Decoder::new();
        let stats = decoder.stats();
        assert_eq!(stats.num_ids, 0);

        let frame = Frame::new(0x259, &[1, 2], 0).unwrap();
        assert!(decoder.decode(&frame).unwrap().is_empty());
    }
}
