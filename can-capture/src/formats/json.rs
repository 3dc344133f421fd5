//! JSON export

use crate::decoder::Decoder;
use crate::store::SeriesKey;
use crate::types::{DecodedSample, Frame, Result, SignalValues};
use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct FrameRecord<'a> {
    timestamp: String,
    timestamp_ns: u64,
    arbitration_id: u32,
    id_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_name: Option<&'static str>,
    is_extended: bool,
    dlc: usize,
    data: &'a [u8],
    data_hex: String,
    signals: SignalValues,
}

#[derive(Debug, Serialize)]
struct SeriesRecord<'a> {
    arbitration_id: u32,
    signal: &'a str,
    #[serde(skip_serializing_if = "String::is_empty")]
    unit: String,
    samples: &'a [DecodedSample],
}

/// Write raw frames with their decoded values as a JSON array
pub fn write_frames_json<W: Write>(writer: &mut W, frames: &[Frame], decoder: &Decoder) -> Result<()> {
    let records: Vec<FrameRecord<'_>> = frames
        .iter()
        .map(|frame| FrameRecord {
            timestamp: frame.timestamp().to_rfc3339_opts(SecondsFormat::Micros, true),
            timestamp_ns: frame.timestamp_ns,
            arbitration_id: frame.arbitration_id,
            id_hex: format!("0x{:X}", frame.arbitration_id),
            id_name: crate::signals::id_display_name(frame.arbitration_id),
            is_extended: frame.is_extended,
            dlc: frame.dlc(),
            data: frame.payload(),
            data_hex: frame.payload_hex(),
            signals: decoder.decode(frame).unwrap_or_default(),
        })
        .collect();

    serde_json::to_writer_pretty(&mut *writer, &records)?;
    writeln!(writer)?;
    Ok(())
}

/// Write stored series as a JSON array; units come from the decoder's definitions
pub fn write_series_json<W: Write>(
    writer: &mut W,
    series: &[(SeriesKey, Vec<DecodedSample>)],
    decoder: &Decoder,
) -> Result<()> {
    let records: Vec<SeriesRecord<'_>> = series
        .iter()
        .map(|(key, samples)| SeriesRecord {
            arbitration_id: key.arbitration_id,
            signal: &key.signal,
            unit: decoder
                .definition(key.arbitration_id, &key.signal)
                .map(|definition| definition.unit)
                .unwrap_or_default(),
            samples,
        })
        .collect();

    serde_json::to_writer_pretty(&mut *writer, &records)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalCatalog;

    #[test]
    fn test_frames_json() {
        let decoder = Decoder::new();
        SignalCatalog::defaults().apply(&decoder).unwrap();

        let frames = vec![Frame::new(0x259, &[0x03, 0xD7], 1_000_000_000).unwrap()];
        let mut out = Vec::new();
        write_frames_json(&mut out, &frames, &decoder).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let record = &parsed[0];
        assert_eq!(record["arbitration_id"], 0x259);
        assert_eq!(record["id_hex"], "0x259");
        assert_eq!(record["data"], serde_json::json!([3, 215]));
        assert_eq!(record["data_hex"], "03D7");
        assert_eq!(record["timestamp"], "1970-01-01T00:00:01.000000Z");
        assert!((record["signals"]["analog_voltage_in1"].as_f64().unwrap() - 55.043).abs() < 1e-9);
    }

    #[test]
    fn test_series_json_includes_units() {
        let decoder = Decoder::new();
        SignalCatalog::defaults().apply(&decoder).unwrap();

        let series = vec![
            (SeriesKey::new(0x25E, "temperature"), vec![DecodedSample::new(5, 47.366)]),
            (SeriesKey::new(0x999, "custom"), vec![DecodedSample::new(6, 1.0)]),
        ];
        let mut out = Vec::new();
        write_series_json(&mut out, &series, &decoder).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["signal"], "temperature");
        assert_eq!(parsed[0]["samples"][0]["timestamp_ns"], 5);
        assert!(parsed[1].get("unit").is_none());
    }
}
