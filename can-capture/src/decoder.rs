//! Main decoder API
//!
//! The [`Decoder`] holds, per arbitration ID, an ordered list of signal
//! definitions and/or a custom override function, and turns one frame into a
//! `signal name → physical value` map.
//!
//! The registry is published as an immutable snapshot. Decoding loads the
//! current snapshot without locking; registration builds a new registry and
//! swaps it in, so a decode never observes a half-applied change.

use crate::signals::SignalDefinition;
use crate::types::{CaptureError, Frame, Result, SignalValues};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Error type returned by override functions
pub type OverrideError = Box<dyn std::error::Error + Send + Sync>;

/// Custom decode function with full access to the raw payload
pub type OverrideFn =
    Arc<dyn Fn(&[u8]) -> std::result::Result<SignalValues, OverrideError> + Send + Sync>;

/// How frames of one arbitration ID are decoded
///
/// The override always wins; shadowed definitions stay queryable.
#[derive(Clone)]
pub enum DecodeRule {
    Definitions(Vec<SignalDefinition>),
    Override(OverrideFn),
    Both(Vec<SignalDefinition>, OverrideFn),
}

impl DecodeRule {
    /// Registered definitions (empty for a bare override)
    pub fn definitions(&self) -> &[SignalDefinition] {
        match self {
            DecodeRule::Definitions(defs) | DecodeRule::Both(defs, _) => defs,
            DecodeRule::Override(_) => &[],
        }
    }

    /// The override function, if any
    pub fn override_fn(&self) -> Option<&OverrideFn> {
        match self {
            DecodeRule::Override(f) | DecodeRule::Both(_, f) => Some(f),
            DecodeRule::Definitions(_) => None,
        }
    }

    fn from_parts(definitions: Vec<SignalDefinition>, override_fn: Option<OverrideFn>) -> Option<Self> {
        match (definitions.is_empty(), override_fn) {
            (true, None) => None,
            (false, None) => Some(DecodeRule::Definitions(definitions)),
            (true, Some(f)) => Some(DecodeRule::Override(f)),
            (false, Some(f)) => Some(DecodeRule::Both(definitions, f)),
        }
    }

    fn into_parts(self) -> (Vec<SignalDefinition>, Option<OverrideFn>) {
        match self {
            DecodeRule::Definitions(defs) => (defs, None),
            DecodeRule::Override(f) => (Vec::new(), Some(f)),
            DecodeRule::Both(defs, f) => (defs, Some(f)),
        }
    }
}

impl fmt::Debug for DecodeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeRule::Definitions(defs) => f.debug_tuple("Definitions").field(defs).finish(),
            DecodeRule::Override(_) => f.write_str("Override(<fn>)"),
            DecodeRule::Both(defs, _) => f.debug_tuple("Both").field(defs).field(&"<fn>").finish(),
        }
    }
}

/// Immutable registry snapshot
#[derive(Debug, Clone, Default)]
struct Registry {
    rules: HashMap<u32, DecodeRule>,
}

impl Registry {
    /// Apply an edit to one ID's rule, dropping the entry when it becomes empty
    fn edit<F>(&mut self, arbitration_id: u32, edit: F)
    where
        F: FnOnce(&mut Vec<SignalDefinition>, &mut Option<OverrideFn>),
    {
        let (mut defs, mut override_fn) = self
            .rules
            .remove(&arbitration_id)
            .map(DecodeRule::into_parts)
            .unwrap_or_default();

        edit(&mut defs, &mut override_fn);

        if let Some(rule) = DecodeRule::from_parts(defs, override_fn) {
            self.rules.insert(arbitration_id, rule);
        }
    }

    fn upsert(&mut self, arbitration_id: u32, definition: SignalDefinition) {
        self.edit(arbitration_id, |defs, _| {
            match defs.iter_mut().find(|d| d.name == definition.name) {
                Some(existing) => *existing = definition,
                None => defs.push(definition),
            }
        });
    }
}

/// Result of decoding one frame, with the number of skipped signals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFrame {
    pub values: SignalValues,
    /// Definitions skipped because the payload was too short
    pub out_of_range: u32,
}

/// Registry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Arbitration IDs with any registration
    pub num_ids: usize,
    /// Total signal definitions
    pub num_signals: usize,
    /// IDs with an override function
    pub num_overrides: usize,
}

/// The main decoder struct - shared between the decoding stage and callers
pub struct Decoder {
    registry: ArcSwap<Registry>,
    /// Serializes writers; readers never take it
    write_lock: Mutex<()>,
    out_of_range: AtomicU64,
}

impl Decoder {
    /// Create a decoder with an empty registry
    pub fn new() -> Self {
        Self {
            registry: ArcSwap::from_pointee(Registry::default()),
            write_lock: Mutex::new(()),
            out_of_range: AtomicU64::new(0),
        }
    }

    fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Registry),
    {
        let _guard = self.write_lock.lock();
        let mut next = Registry::clone(&self.registry.load());
        mutate(&mut next);
        self.registry.store(Arc::new(next));
    }

    /// Register a signal definition for an arbitration ID
    ///
    /// The definition is validated before anything is published. A definition
    /// with the same name as an existing one for that ID replaces it.
    ///
    /// # Example
    /// ```
    /// use can_capture::{Decoder, SignalDefinition};
    ///
    /// let decoder = Decoder::new();
    /// decoder
    ///     .register(0x259, SignalDefinition::new("analog_voltage_in1", 0, 2).with_scaling(0.001, 0.0))
    ///     .unwrap();
    /// assert_eq!(decoder.list_signals(0x259), vec!["analog_voltage_in1"]);
    /// ```
    pub fn register(&self, arbitration_id: u32, definition: SignalDefinition) -> Result<()> {
        definition.validate()?;
        log::debug!("Registering signal '{}' on ID 0x{:X}", definition.name, arbitration_id);
        self.update(|registry| registry.upsert(arbitration_id, definition));
        Ok(())
    }

    /// Register many definitions at once
    ///
    /// All entries are validated first; on any failure nothing is registered.
    /// Returns the number of definitions registered.
    pub fn register_all<I>(&self, definitions: I) -> Result<usize>
    where
        I: IntoIterator<Item = (u32, SignalDefinition)>,
    {
        let definitions: Vec<(u32, SignalDefinition)> = definitions.into_iter().collect();
        for (_, definition) in &definitions {
            definition.validate()?;
        }

        let count = definitions.len();
        self.update(|registry| {
            for (arbitration_id, definition) in definitions {
                registry.upsert(arbitration_id, definition);
            }
        });
        log::info!("Registered {} signal definitions", count);
        Ok(count)
    }

    /// Register a custom decode function for an arbitration ID
    ///
    /// Replaces any previous override for that ID; definitions are kept but
    /// are not used for decoding while the override is present.
    pub fn register_override<F>(&self, arbitration_id: u32, decode: F)
    where
        F: Fn(&[u8]) -> std::result::Result<SignalValues, OverrideError> + Send + Sync + 'static,
    {
        let decode: OverrideFn = Arc::new(decode);
        log::debug!("Registering override on ID 0x{:X}", arbitration_id);
        self.update(|registry| {
            registry.edit(arbitration_id, |_, override_fn| *override_fn = Some(decode));
        });
    }

    /// Remove one definition; returns false if it was not registered
    pub fn unregister(&self, arbitration_id: u32, name: &str) -> bool {
        let mut removed = false;
        self.update(|registry| {
            registry.edit(arbitration_id, |defs, _| {
                let before = defs.len();
                defs.retain(|d| d.name != name);
                removed = defs.len() != before;
            });
        });
        removed
    }

    /// Remove the override for an ID; returns false if there was none
    pub fn remove_override(&self, arbitration_id: u32) -> bool {
        let mut removed = false;
        self.update(|registry| {
            registry.edit(arbitration_id, |_, override_fn| {
                removed = override_fn.take().is_some();
            });
        });
        removed
    }

    /// Drop every registration
    pub fn clear(&self) {
        self.update(|registry| registry.rules.clear());
    }

    /// Decode a frame into signal values
    ///
    /// Unknown IDs yield an empty map. An override's result is returned
    /// verbatim; its failure becomes [`CaptureError::DecodeError`]. Definitions
    /// whose bytes are missing from the payload are skipped and counted.
    pub fn decode(&self, frame: &Frame) -> Result<SignalValues> {
        self.decode_frame(frame).map(|decoded| decoded.values)
    }

    /// Decode a frame and report how many definitions were skipped
    pub fn decode_frame(&self, frame: &Frame) -> Result<DecodedFrame> {
        let registry = self.registry.load();
        let Some(rule) = registry.rules.get(&frame.arbitration_id) else {
            log::trace!("Unknown CAN ID: 0x{:X}", frame.arbitration_id);
            return Ok(DecodedFrame::default());
        };

        if let Some(decode) = rule.override_fn() {
            return decode(frame.payload())
                .map(|values| DecodedFrame { values, out_of_range: 0 })
                .map_err(|e| CaptureError::DecodeError {
                    arbitration_id: frame.arbitration_id,
                    message: e.to_string(),
                });
        }

        let mut decoded = DecodedFrame::default();
        for definition in rule.definitions() {
            match definition.extract(frame.payload()) {
                Ok(value) => {
                    decoded.values.entry(definition.name.clone()).or_insert(value);
                }
                Err(e) => {
                    log::warn!("CAN ID 0x{:X}: {}", frame.arbitration_id, e);
                    decoded.out_of_range += 1;
                }
            }
        }

        if decoded.out_of_range > 0 {
            self.out_of_range
                .fetch_add(decoded.out_of_range as u64, Ordering::Relaxed);
        }
        Ok(decoded)
    }

    /// Signal names registered for an ID, in registration order
    pub fn list_signals(&self, arbitration_id: u32) -> Vec<String> {
        self.registry
            .load()
            .rules
            .get(&arbitration_id)
            .map(|rule| rule.definitions().iter().map(|d| d.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Registered definitions for an ID, including shadowed ones
    pub fn definitions(&self, arbitration_id: u32) -> Vec<SignalDefinition> {
        self.registry
            .load()
            .rules
            .get(&arbitration_id)
            .map(|rule| rule.definitions().to_vec())
            .unwrap_or_default()
    }

    /// Find a single definition by ID and name
    pub fn definition(&self, arbitration_id: u32, name: &str) -> Option<SignalDefinition> {
        self.registry
            .load()
            .rules
            .get(&arbitration_id)
            .and_then(|rule| rule.definitions().iter().find(|d| d.name == name).cloned())
    }

    /// True if an override function is registered for the ID
    pub fn has_override(&self, arbitration_id: u32) -> bool {
        self.registry
            .load()
            .rules
            .get(&arbitration_id)
            .is_some_and(|rule| rule.override_fn().is_some())
    }

    /// All IDs with a registration, sorted
    pub fn registered_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.registry.load().rules.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Get statistics about the registry
    pub fn stats(&self) -> DecoderStats {
        let registry = self.registry.load();
        DecoderStats {
            num_ids: registry.rules.len(),
            num_signals: registry.rules.values().map(|r| r.definitions().len()).sum(),
            num_overrides: registry
                .rules
                .values()
                .filter(|r| r.override_fn().is_some())
                .count(),
        }
    }

    /// Total definitions skipped because a payload was too short
    pub fn out_of_range_count(&self) -> u64 {
        self.out_of_range.load(Ordering::Relaxed)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("stats", &self.stats())
            .field("out_of_range", &self.out_of_range_count())
            .finish()
    }
}
