//! Import and export formats
//!
//! - Dump log: `(ts) channel ID#DATA` text lines, read for replay and written
//!   for raw-frame export
//! - CSV: raw frames with decoded columns, or stored series in long format
//! - JSON: the same two views as arrays of records

pub mod csv;
pub mod dumplog;
pub mod json;

use crate::decoder::Decoder;
use crate::store::SeriesKey;
use crate::types::{CaptureError, DecodedSample, Frame, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    #[serde(rename = "dump", alias = "dumplog", alias = "candump")]
    DumpLog,
}

impl ExportFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "log" => Some(Self::DumpLog),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::DumpLog => "dump",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "dump" | "dumplog" | "candump" => Ok(Self::DumpLog),
            other => Err(CaptureError::InvalidConfig(format!(
                "unknown export format '{}' (expected csv, json or dump)",
                other
            ))),
        }
    }
}

/// Export raw frames in the given format
pub fn export_frames<W: Write>(
    format: ExportFormat,
    writer: &mut W,
    frames: &[Frame],
    decoder: &Decoder,
    channel: &str,
) -> Result<()> {
    match format {
        ExportFormat::Csv => csv::write_frames_csv(writer, frames, decoder),
        ExportFormat::Json => json::write_frames_json(writer, frames, decoder),
        ExportFormat::DumpLog => dumplog::write_dump_log(writer, frames, channel),
    }
}

/// Export stored series; the dump log holds raw frames only
pub fn export_series<W: Write>(
    format: ExportFormat,
    writer: &mut W,
    series: &[(SeriesKey, Vec<DecodedSample>)],
    decoder: &Decoder,
) -> Result<()> {
    match format {
        ExportFormat::Csv => csv::write_series_csv(writer, series),
        ExportFormat::Json => json::write_series_json(writer, series, decoder),
        ExportFormat::DumpLog => Err(CaptureError::InvalidConfig(
            "series cannot be exported as a dump log".to_string(),
        )),
    }
}

/// Export raw frames to a file
pub fn export_frames_to_file(
    format: ExportFormat,
    path: &Path,
    frames: &[Frame],
    decoder: &Decoder,
    channel: &str,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    export_frames(format, &mut writer, frames, decoder, channel)?;
    writer.flush()?;
    log::info!("Exported {} frames as {} to {:?}", frames.len(), format, path);
    Ok(())
}

/// Export stored series to a file
pub fn export_series_to_file(
    format: ExportFormat,
    path: &Path,
    series: &[(SeriesKey, Vec<DecodedSample>)],
    decoder: &Decoder,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    export_series(format, &mut writer, series, decoder)?;
    writer.flush()?;
    log::info!("Exported {} series as {} to {:?}", series.len(), format, path);
    Ok(())
}
