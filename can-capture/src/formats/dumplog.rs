//! Dump-log text format
//!
//! One frame per line: `(seconds.micros) channel ID#HEXDATA`, e.g.
//! `(1700000000.250000) can0 259#03D705EC06B90000`. Standard IDs use three hex
//! digits and extended IDs eight. Parsing also accepts payload bytes separated
//! by spaces.

use crate::types::{CaptureError, Frame, Result};
use std::io::Write;
use std::path::Path;

/// Format one frame as a dump-log line (without newline)
pub fn format_line(frame: &Frame, channel: &str) -> String {
    let secs = frame.timestamp_ns / 1_000_000_000;
    let micros = (frame.timestamp_ns % 1_000_000_000) / 1_000;
    format!("({}.{:06}) {} {}", secs, micros, channel, frame)
}

/// Write frames as dump-log lines
pub fn write_dump_log<W: Write>(writer: &mut W, frames: &[Frame], channel: &str) -> Result<()> {
    for frame in frames {
        writeln!(writer, "{}", format_line(frame, channel))?;
    }
    Ok(())
}

fn parse_timestamp_ns(text: &str) -> Result<u64> {
    let invalid = || CaptureError::LogParseError(format!("invalid timestamp '{}'", text));
    let (secs, frac) = text.split_once('.').unwrap_or((text, ""));
    let secs: u64 = secs.parse().map_err(|_| invalid())?;
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    // Right-pad or truncate the fraction to nanoseconds
    let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
    let nanos: u64 = digits.parse().map_err(|_| invalid())?;
    secs.checked_mul(1_000_000_000)
        .and_then(|ns| ns.checked_add(nanos))
        .ok_or_else(invalid)
}

/// Parse one dump-log line
///
/// Returns `Ok(None)` for blank lines, comments and remote frames.
pub fn parse_line(line: &str) -> Result<Option<(String, Frame)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("//") || line.starts_with(';') {
        return Ok(None);
    }

    let rest = line
        .strip_prefix('(')
        .ok_or_else(|| CaptureError::LogParseError("missing '(' before timestamp".to_string()))?;
    let (ts_text, rest) = rest
        .split_once(')')
        .ok_or_else(|| CaptureError::LogParseError("missing ')' after timestamp".to_string()))?;
    let timestamp_ns = parse_timestamp_ns(ts_text.trim())?;

    let mut fields = rest.split_whitespace();
    let channel = fields
        .next()
        .ok_or_else(|| CaptureError::LogParseError("missing channel".to_string()))?;
    let frame_text: String = fields.collect();

    let (id_text, data_text) = frame_text
        .split_once('#')
        .ok_or_else(|| CaptureError::LogParseError(format!("missing '#' in '{}'", frame_text)))?;

    if data_text.starts_with('#') {
        return Err(CaptureError::LogParseError("CAN FD frames are not supported".to_string()));
    }
    if data_text.starts_with('R') || data_text.starts_with('r') {
        log::debug!("Skipping remote frame {}", frame_text);
        return Ok(None);
    }

    let arbitration_id = u32::from_str_radix(id_text, 16)
        .map_err(|_| CaptureError::LogParseError(format!("invalid ID '{}'", id_text)))?;
    let data = hex::decode(data_text)
        .map_err(|e| CaptureError::LogParseError(format!("invalid payload '{}': {}", data_text, e)))?;

    let frame = Frame::with_id_kind(arbitration_id, id_text.len() > 3, &data, timestamp_ns)?;
    Ok(Some((channel.to_string(), frame)))
}

/// Parse a whole dump log, ignoring channel names
pub fn parse_dump_log(content: &str) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    for (index, line) in content.lines().enumerate() {
        match parse_line(line) {
            Ok(Some((_, frame))) => frames.push(frame),
            Ok(None) => {}
            Err(CaptureError::LogParseError(message)) => {
                return Err(CaptureError::LogParseError(format!("line {}: {}", index + 1, message)));
            }
            Err(e) => {
                return Err(CaptureError::LogParseError(format!("line {}: {}", index + 1, e)));
            }
        }
    }
    Ok(frames)
}

/// Read a dump log file
pub fn read_dump_log(path: &Path) -> Result<Vec<Frame>> {
    log::info!("Parsing dump log: {:?}", path);

    if !path.exists() {
        return Err(CaptureError::LogParseError(format!("dump log not found: {:?}", path)));
    }

    let content = std::fs::read_to_string(path)?;
    parse_dump_log(&content)
}
