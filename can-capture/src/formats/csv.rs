//! CSV export
//!
//! Two layouts: one row per raw frame with a column per decoded signal name,
//! and one row per stored sample (long format).

use crate::decoder::Decoder;
use crate::store::SeriesKey;
use crate::types::{DecodedSample, Frame, Result, SignalValues};
use chrono::SecondsFormat;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::io::Write;

/// Quote a field if it contains a delimiter, quote or line break
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn format_timestamp(timestamp_ns: u64) -> String {
    crate::types::timestamp_from_ns(timestamp_ns).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Write raw frames with their decoded values
///
/// Columns: `timestamp,arbitration_id,dlc,payload`, then one column per signal
/// name seen in the export (sorted). Frames that fail to decode keep their raw
/// columns and leave the signal columns empty.
pub fn write_frames_csv<W: Write>(writer: &mut W, frames: &[Frame], decoder: &Decoder) -> Result<()> {
    let decoded: Vec<SignalValues> = frames
        .iter()
        .map(|frame| {
            decoder.decode(frame).unwrap_or_else(|e| {
                log::debug!("Exporting {} without signals: {}", frame, e);
                SignalValues::new()
            })
        })
        .collect();

    let columns: BTreeSet<&str> = decoded
        .iter()
        .flat_map(|values| values.keys().map(String::as_str))
        .collect();

    write!(writer, "timestamp,arbitration_id,dlc,payload")?;
    for name in &columns {
        write!(writer, ",{}", escape(name))?;
    }
    writeln!(writer)?;

    for (frame, values) in frames.iter().zip(&decoded) {
        write!(
            writer,
            "{},0x{:X},{},{}",
            format_timestamp(frame.timestamp_ns),
            frame.arbitration_id,
            frame.dlc(),
            frame.payload_hex()
        )?;
        for name in &columns {
            match values.get(*name) {
                Some(value) => write!(writer, ",{}", value)?,
                None => write!(writer, ",")?,
            }
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// Write stored series, one row per sample
pub fn write_series_csv<W: Write>(
    writer: &mut W,
    series: &[(SeriesKey, Vec<DecodedSample>)],
) -> Result<()> {
    writeln!(writer, "timestamp,arbitration_id,signal,value")?;
    for (key, samples) in series {
        for sample in samples {
            writeln!(
                writer,
                "{},0x{:X},{},{}",
                format_timestamp(sample.timestamp_ns),
                key.arbitration_id,
                escape(&key.signal),
                sample.value
            )?;
        }
    }
    Ok(())
}
