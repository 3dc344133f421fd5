//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_capture::{CaptureConfig, ExportFormat, SignalCatalog, SignalConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from capture.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub signals: Vec<SignalConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    /// Also register the built-in analog module signals
    #[serde(default)]
    pub use_default_signals: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: ExportFormat,
    /// Raw frame export
    pub path: Option<PathBuf>,
    /// Stored time series export
    pub series_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn catalog(&self) -> SignalCatalog {
        SignalCatalog::new(self.signals.clone())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .capture
        .validate()
        .with_context(|| format!("Invalid [capture] section in {:?}", path))?;
    for signal in &config.signals {
        signal.to_definition().with_context(|| {
            format!("Invalid signal '{}' on ID 0x{:X}", signal.name, signal.arbitration_id)
        })?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            use_default_signals = true

            [capture]
            queue_capacity = 256
            id_filter = [0x259, 0x25E]

            [capture.bus]
            channel = "vcan0"

            [[signals]]
            id = 0x25A
            name = "analog_voltage_in5"
            byte_offset = 0
            data_type = "uint16_le"
            scale = 0.001
            unit = "V"

            [output]
            format = "json"
            path = "frames.json"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert!(config.use_default_signals);
        assert_eq!(config.capture.queue_capacity, 256);
        assert_eq!(config.capture.bus.channel, "vcan0");
        assert_eq!(config.capture.bus.bitrate, 500_000);
        assert_eq!(config.signals.len(), 1);
        assert_eq!(config.output.format, ExportFormat::Json);
        assert_eq!(config.output.path, Some(PathBuf::from("frames.json")));
        assert_eq!(config.catalog().len(), 1);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.capture, CaptureConfig::default());
        assert!(config.signals.is_empty());
        assert_eq!(config.output.format, ExportFormat::Csv);
    }

    #[test]
    fn test_load_config_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[signals]]\nid = 0x100\nname = \"bad\"\nbyte_offset = 7\ndata_type = \"uint16_le\""
        )
        .unwrap();
        assert!(load_config(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[capture]\nqueue_capacity = 0").unwrap();
        assert!(load_config(file.path()).is_err());

        assert!(load_config(Path::new("missing.toml")).is_err());
    }
}
