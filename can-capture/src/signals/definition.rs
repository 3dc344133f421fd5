//! Byte-aligned signal definitions
//!
//! A signal is carved out of a payload as one or two whole bytes, reassembled
//! in the configured byte order, optionally sign-extended and then scaled to a
//! physical value.

use crate::types::{CaptureError, Result, MAX_PAYLOAD_LEN};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Byte order for multi-byte signals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Little-endian (Intel format): first byte is least significant
    #[default]
    Little,
    /// Big-endian (Motorola format): first byte is most significant
    Big,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signedness {
    /// Two's complement
    Signed,
    #[default]
    Unsigned,
}

/// Common signal layouts, as offered by the decoder presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Uint8,
    Int8,
    Uint16Le,
    Uint16Be,
    Int16Le,
    Int16Be,
}

impl DataType {
    pub const ALL: [DataType; 6] = [
        DataType::Uint8,
        DataType::Int8,
        DataType::Uint16Le,
        DataType::Uint16Be,
        DataType::Int16Le,
        DataType::Int16Be,
    ];

    /// Width, signedness and byte order of this layout
    pub fn layout(self) -> (u8, Signedness, ByteOrder) {
        match self {
            DataType::Uint8 => (1, Signedness::Unsigned, ByteOrder::Little),
            DataType::Int8 => (1, Signedness::Signed, ByteOrder::Little),
            DataType::Uint16Le => (2, Signedness::Unsigned, ByteOrder::Little),
            DataType::Uint16Be => (2, Signedness::Unsigned, ByteOrder::Big),
            DataType::Int16Le => (2, Signedness::Signed, ByteOrder::Little),
            DataType::Int16Be => (2, Signedness::Signed, ByteOrder::Big),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Uint8 => "uint8",
            DataType::Int8 => "int8",
            DataType::Uint16Le => "uint16_le",
            DataType::Uint16Be => "uint16_be",
            DataType::Int16Le => "int16_le",
            DataType::Int16Be => "int16_be",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        DataType::ALL
            .into_iter()
            .find(|dt| dt.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CaptureError::InvalidDefinition(format!("unknown data type '{}'", s)))
    }
}

/// How to decode one named value from a frame payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDefinition {
    /// Signal name, unique within its arbitration ID
    pub name: String,
    /// First byte of the signal in the payload (0-7)
    pub byte_offset: u8,
    /// Number of bytes (1 or 2)
    pub width_bytes: u8,
    pub signedness: Signedness,
    pub byte_order: ByteOrder,
    /// Scale factor to convert raw value to physical value
    pub scale: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Engineering unit (e.g., "V", "°C"), display only
    pub unit: String,
}

impl SignalDefinition {
    /// Create an unsigned little-endian definition with unit scaling
    pub fn new(name: impl Into<String>, byte_offset: u8, width_bytes: u8) -> Self {
        Self {
            name: name.into(),
            byte_offset,
            width_bytes,
            signedness: Signedness::Unsigned,
            byte_order: ByteOrder::Little,
            scale: 1.0,
            offset: 0.0,
            unit: String::new(),
        }
    }

    /// Create a definition from a preset layout
    pub fn from_data_type(name: impl Into<String>, byte_offset: u8, data_type: DataType) -> Self {
        let (width_bytes, signedness, byte_order) = data_type.layout();
        Self::new(name, byte_offset, width_bytes)
            .with_signedness(signedness)
            .with_byte_order(byte_order)
    }

    /// Builder method: set signedness
    pub fn with_signedness(mut self, signedness: Signedness) -> Self {
        self.signedness = signedness;
        self
    }

    /// Builder method: set byte order
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Builder method: set scale and offset
    pub fn with_scaling(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    /// Builder method: set the display unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Number of payload bytes a frame must carry for this signal
    pub fn required_len(&self) -> usize {
        self.byte_offset as usize + self.width_bytes as usize
    }

    /// Check the definition can be evaluated against an 8-byte payload
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CaptureError::InvalidDefinition(
                "signal name must not be empty".to_string(),
            ));
        }
        if !matches!(self.width_bytes, 1 | 2) {
            return Err(CaptureError::InvalidDefinition(format!(
                "signal '{}': width must be 1 or 2 bytes, got {}",
                self.name, self.width_bytes
            )));
        }
        if self.required_len() > MAX_PAYLOAD_LEN {
            return Err(CaptureError::InvalidDefinition(format!(
                "signal '{}': byte offset {} + width {} exceeds {} bytes",
                self.name, self.byte_offset, self.width_bytes, MAX_PAYLOAD_LEN
            )));
        }
        if !self.scale.is_finite() || !self.offset.is_finite() {
            return Err(CaptureError::InvalidDefinition(format!(
                "signal '{}': scale and offset must be finite",
                self.name
            )));
        }
        Ok(())
    }

    /// Extract the raw integer value (after sign extension)
    pub fn extract_raw(&self, payload: &[u8]) -> Result<i64> {
        let start = self.byte_offset as usize;
        let end = self.required_len();
        let bytes = payload.get(start..end).ok_or_else(|| CaptureError::OutOfRange {
            signal: self.name.clone(),
            required: end,
            available: payload.len(),
        })?;

        let raw = match (self.width_bytes, self.signedness) {
            (1, Signedness::Unsigned) => bytes[0] as i64,
            (1, Signedness::Signed) => bytes[0] as i8 as i64,
            (2, signedness) => {
                let word = match self.byte_order {
                    ByteOrder::Little => LittleEndian::read_u16(bytes),
                    ByteOrder::Big => BigEndian::read_u16(bytes),
                };
                match signedness {
                    Signedness::Unsigned => word as i64,
                    Signedness::Signed => word as i16 as i64,
                }
            }
            (width, _) => {
                return Err(CaptureError::InvalidDefinition(format!(
                    "signal '{}': width_bytes must be 1 or 2, got {}",
                    self.name, width
                )));
            }
        };

        Ok(raw)
    }

    /// Extract the physical value: `raw * scale + offset`
    pub fn extract(&self, payload: &[u8]) -> Result<f64> {
        let raw = self.extract_raw(payload)?;
        Ok(raw as f64 * self.scale + self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ByteOrder as _;

    const SAMPLE: [u8; 8] = [0x03, 0xD7, 0x05, 0xEC, 0x06, 0xB9, 0x00, 0x00];

    #[test]
    fn test_uint16_le_raw_and_scaled() {
        let raw = SignalDefinition::new("analog_voltage_in1_raw", 0, 2);
        assert_eq!(raw.extract(&SAMPLE).unwrap(), 55043.0);

        let scaled = raw.clone().with_scaling(0.001, 0.0);
        assert!((scaled.extract(&SAMPLE).unwrap() - 55.043).abs() < 1e-9);
    }

    #[test]
    fn test_signed_16bit_minus_one() {
        let def = SignalDefinition::from_data_type("current", 0, DataType::Int16Le);
        assert_eq!(def.extract(&[0xFF, 0xFF]).unwrap(), -1.0);
        assert_eq!(def.extract_raw(&[0x00, 0x80]).unwrap(), -32768);
    }

    #[test]
    fn test_byte_order() {
        let data = [0x12, 0x34];
        let be = SignalDefinition::from_data_type("be", 0, DataType::Uint16Be);
        let le = SignalDefinition::from_data_type("le", 0, DataType::Uint16Le);
        assert_eq!(be.extract(&data).unwrap(), 4660.0);
        assert_eq!(le.extract(&data).unwrap(), 13330.0);
    }

    #[test]
    fn test_single_byte_signedness() {
        let unsigned = SignalDefinition::from_data_type("u", 0, DataType::Uint8);
        let signed = SignalDefinition::from_data_type("s", 0, DataType::Int8);
        assert_eq!(unsigned.extract(&[0x80]).unwrap(), 128.0);
        assert_eq!(signed.extract(&[0x80]).unwrap(), -128.0);
        assert_eq!(signed.extract(&[0x7F]).unwrap(), 127.0);
    }

    #[test]
    fn test_temperature_offset() {
        // Typical 8-bit temperature encoding: raw - 40
        let def = SignalDefinition::from_data_type("coolant", 3, DataType::Uint8)
            .with_scaling(1.0, -40.0)
            .with_unit("°C");
        assert_eq!(def.extract(&[0, 0, 0, 100]).unwrap(), 60.0);
    }

    #[test]
    fn test_extract_rejects_unsupported_width() {
        let payload = [0x01, 0x02, 0x03, 0x04];
        for width in [0u8, 3, 4] {
            let def = SignalDefinition::new("wide", 0, width);
            assert!(
                matches!(def.extract(&payload), Err(CaptureError::InvalidDefinition(_))),
                "width {}",
                width
            );
        }
    }

    #[test]
    fn test_out_of_range_on_short_payload() {
        let def = SignalDefinition::new("temperature", 4, 2);
        match def.extract(&SAMPLE[..5]) {
            Err(CaptureError::OutOfRange { signal, required, available }) => {
                assert_eq!(signal, "temperature");
                assert_eq!(required, 6);
                assert_eq!(available, 5);
            }
            other => panic!("expected OutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_offset_width_grid() {
        for offset in 0u8..=8 {
            for width in 1u8..=2 {
                let def = SignalDefinition::new("sig", offset, width);
                let fits = offset as usize + width as usize <= MAX_PAYLOAD_LEN;
                assert_eq!(def.validate().is_ok(), fits, "offset {} width {}", offset, width);
            }
        }
        assert!(SignalDefinition::new("sig", 0, 3).validate().is_err());
        assert!(SignalDefinition::new("sig", 0, 0).validate().is_err());
        assert!(SignalDefinition::new("", 0, 1).validate().is_err());
        assert!(SignalDefinition::new("sig", 0, 1)
            .with_scaling(f64::NAN, 0.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_encoded_values_decode_back() {
        // Placed mid-frame so offset handling is exercised too
        let cases: [(DataType, i64); 6] = [
            (DataType::Uint8, 200),
            (DataType::Int8, -100),
            (DataType::Uint16Le, 60_421),
            (DataType::Uint16Be, 60_421),
            (DataType::Int16Le, -12_345),
            (DataType::Int16Be, -12_345),
        ];
        for (data_type, value) in cases {
            let mut payload = [0u8; 8];
            match data_type {
                DataType::Uint8 | DataType::Int8 => payload[3] = value as u8,
                DataType::Uint16Le | DataType::Int16Le => {
                    LittleEndian::write_u16(&mut payload[3..5], value as u16)
                }
                DataType::Uint16Be | DataType::Int16Be => {
                    BigEndian::write_u16(&mut payload[3..5], value as u16)
                }
            }
            let def = SignalDefinition::from_data_type("sig", 3, data_type).with_scaling(0.5, 10.0);
            assert_eq!(def.extract_raw(&payload).unwrap(), value, "{}", data_type);
            assert_eq!((def.extract(&payload).unwrap() - 10.0) / 0.5, value as f64);
        }
    }

    #[test]
    fn test_data_type_parsing() {
        assert_eq!("uint16_le".parse::<DataType>().unwrap(), DataType::Uint16Le);
        assert_eq!("INT16_BE".parse::<DataType>().unwrap(), DataType::Int16Be);
        assert!("float32".parse::<DataType>().is_err());
        assert_eq!(DataType::Int8.to_string(), "int8");
    }
}
