//! Signal definitions and the flat signal configuration
//!
//! This module contains the byte-aligned signal model and the catalog used to
//! load per-ID signal lists from configuration.

pub mod catalog;
pub mod definition;

// Re-export key types for convenience
pub use catalog::{id_display_name, SignalCatalog, SignalConfig};
pub use definition::{ByteOrder, DataType, SignalDefinition, Signedness};
