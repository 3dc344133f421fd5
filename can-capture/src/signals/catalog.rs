//! Flat signal configuration
//!
//! Signals are configured as a flat list of entries, one per
//! (arbitration ID, signal) pair. Entries either spell out the layout
//! (`width_bytes`, `signedness`, `byte_order`) or use a `data_type` preset.
//!
//! ```toml
//! [[signals]]
//! arbitration_id = 0x259
//! name = "analog_voltage_in1"
//! byte_offset = 0
//! data_type = "uint16_le"
//! scale = 0.001
//! unit = "V"
//! ```

use super::definition::{ByteOrder, DataType, SignalDefinition, Signedness};
use crate::decoder::Decoder;
use crate::types::{CaptureError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Keep-alive frame of the reference analog input module
pub const CAN_ID_KEEP_ALIVE: u32 = 0x258;
/// Analog inputs 1-4
pub const CAN_ID_AIN1_4: u32 = 0x259;
/// Analog inputs 5-8
pub const CAN_ID_AIN5_8: u32 = 0x25A;
/// Analog inputs 9-12
pub const CAN_ID_AIN9_12: u32 = 0x25B;
/// Analog inputs 13-16
pub const CAN_ID_AIN13_16: u32 = 0x25C;
/// Analog inputs 17-20
pub const CAN_ID_AIN17_20: u32 = 0x25D;
/// Analog input 21, internal voltage and temperature
pub const CAN_ID_AIN21_TEMP: u32 = 0x25E;

const WELL_KNOWN_IDS: [(u32, &str); 7] = [
    (CAN_ID_KEEP_ALIVE, "Keep Alive"),
    (CAN_ID_AIN1_4, "Analog Inputs 1-4"),
    (CAN_ID_AIN5_8, "Analog Inputs 5-8"),
    (CAN_ID_AIN9_12, "Analog Inputs 9-12"),
    (CAN_ID_AIN13_16, "Analog Inputs 13-16"),
    (CAN_ID_AIN17_20, "Analog Inputs 17-20"),
    (CAN_ID_AIN21_TEMP, "Analog Input 21 / Temperature"),
];

/// Human-readable name of a well-known arbitration ID
pub fn id_display_name(arbitration_id: u32) -> Option<&'static str> {
    WELL_KNOWN_IDS
        .iter()
        .find(|(id, _)| *id == arbitration_id)
        .map(|(_, name)| *name)
}

/// One configured signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(alias = "id")]
    pub arbitration_id: u32,
    pub name: String,
    pub byte_offset: u8,

    /// Preset layout; when set it takes precedence over the explicit fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_bytes: Option<u8>,

    #[serde(default)]
    pub signedness: Signedness,

    #[serde(default)]
    pub byte_order: ByteOrder,

    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default)]
    pub offset: f64,

    #[serde(default)]
    pub unit: String,
}

fn default_scale() -> f64 {
    1.0
}

impl SignalConfig {
    /// Build a preset-based entry
    pub fn preset(
        arbitration_id: u32,
        name: impl Into<String>,
        byte_offset: u8,
        data_type: DataType,
        scale: f64,
        offset: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            arbitration_id,
            name: name.into(),
            byte_offset,
            data_type: Some(data_type),
            width_bytes: None,
            signedness: Signedness::default(),
            byte_order: ByteOrder::default(),
            scale,
            offset,
            unit: unit.into(),
        }
    }

    /// Convert to a validated signal definition
    pub fn to_definition(&self) -> Result<SignalDefinition> {
        let definition = match (self.data_type, self.width_bytes) {
            (Some(data_type), _) => {
                SignalDefinition::from_data_type(self.name.clone(), self.byte_offset, data_type)
            }
            (None, Some(width)) => SignalDefinition::new(self.name.clone(), self.byte_offset, width)
                .with_signedness(self.signedness)
                .with_byte_order(self.byte_order),
            (None, None) => {
                return Err(CaptureError::InvalidDefinition(format!(
                    "signal '{}' (ID 0x{:X}): either data_type or width_bytes is required",
                    self.name, self.arbitration_id
                )))
            }
        }
        .with_scaling(self.scale, self.offset)
        .with_unit(self.unit.clone());

        definition.validate()?;
        Ok(definition)
    }
}

/// A flat list of signal entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalCatalog {
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
}

impl SignalCatalog {
    pub fn new(signals: Vec<SignalConfig>) -> Self {
        Self { signals }
    }

    /// Parse a catalog from TOML text (`[[signals]]` tables)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CaptureError::InvalidConfig(e.to_string()))
    }

    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("Loading signal catalog: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The decoders the analog input module ships with
    pub fn defaults() -> Self {
        Self::new(vec![
            SignalConfig::preset(CAN_ID_AIN1_4, "analog_voltage_in1", 0, DataType::Uint16Le, 0.001, 0.0, "V"),
            SignalConfig::preset(CAN_ID_AIN21_TEMP, "internal_voltage", 2, DataType::Uint16Le, 0.001, 0.0, "V"),
            SignalConfig::preset(CAN_ID_AIN21_TEMP, "temperature", 4, DataType::Uint16Le, 0.001, 0.0, "°C"),
        ])
    }

    /// Validate every entry and register them on the decoder in one step
    ///
    /// Nothing is registered if any entry is invalid.
    pub fn apply(&self, decoder: &Decoder) -> Result<usize> {
        let entries = self
            .signals
            .iter()
            .map(|cfg| cfg.to_definition().map(|def| (cfg.arbitration_id, def)))
            .collect::<Result<Vec<_>>>()?;
        decoder.register_all(entries)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
