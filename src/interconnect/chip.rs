//! Chip model loading.
//!
//! The base chip is described as a flat list of tagged JSON records. Only
//! four record types matter here:
//!
//! ```text
//! { "type": "source_port", "source_port_id": ..., "pin_number": 12,
//!   "port_hints": ["pin12", "C3"], "subcircuit_connectivity_map_key": ... }
//! { "type": "source_net",   "source_net_id": ..., "name": ...,
//!   "subcircuit_connectivity_map_key": ... }
//! { "type": "source_trace", "source_trace_id": ..., "connected_source_port_ids": [...] }
//! { "type": "pcb_smtpad",   "pcb_smtpad_id": ..., "x": ..., "y": ...,
//!   "width": ..., "port_hints": [...] }
//! ```
//!
//! The list may be given bare or wrapped in an object under `objects`.
//! Records of other types are ignored, and individual records that fail to
//! parse are skipped with a warning.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::interconnect::error::{InterconnectError, InterconnectResult};

/// A chip pin (`source_port` record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePort {
    /// Record identifier.
    pub source_port_id: String,

    /// Human readable pin name.
    #[serde(default)]
    pub name: String,

    /// Physical pin number (1-100).
    pub pin_number: u32,

    /// Aliases used to cross-reference pads and user selections.
    #[serde(default)]
    pub port_hints: Vec<String>,

    /// Native connectivity key shared by all pins of one net.
    pub subcircuit_connectivity_map_key: String,

    /// Owning component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_component_id: Option<String>,

    /// Owning sub-circuit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcircuit_id: Option<String>,
}

impl SourcePort {
    /// Returns `true` if any of this pin's hints equals `hint`.
    #[must_use]
    pub fn has_hint(&self, hint: &str) -> bool {
        self.port_hints.iter().any(|h| h == hint)
    }
}

/// A declared net (`source_net` record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNet {
    /// Record identifier.
    pub source_net_id: String,

    /// Net name.
    #[serde(default)]
    pub name: String,

    /// Connectivity key of the pins this net joins.
    pub subcircuit_connectivity_map_key: String,
}

/// An internal trace (`source_trace` record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTrace {
    /// Record identifier.
    pub source_trace_id: String,

    /// Pins joined by the trace.
    #[serde(default)]
    pub connected_source_port_ids: Vec<String>,

    /// Nets joined by the trace.
    #[serde(default)]
    pub connected_source_net_ids: Vec<String>,

    /// Connectivity key shared with the joined pins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcircuit_connectivity_map_key: Option<String>,
}

/// Copper layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Top copper.
    #[default]
    Top,
    /// Bottom copper.
    Bottom,
}

/// Pad shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadShape {
    /// Rectangular pad.
    #[default]
    Rect,
    /// Circular pad, sized by `radius`.
    Circle,
    /// Rectangle with fully rounded ends.
    Pill,
    /// Rectangle with a rotation.
    RotatedRect,
}

/// A physical surface-mount pad (`pcb_smtpad` record).
///
/// Positions are in millimetres with the origin at the chip centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmtPad {
    /// Record identifier.
    pub pcb_smtpad_id: String,

    /// Layer the pad is on.
    #[serde(default)]
    pub layer: Layer,

    /// Pad shape.
    #[serde(default)]
    pub shape: PadShape,

    /// Pad width in mm (rectangular shapes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    /// Pad height in mm (rectangular shapes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    /// Pad radius in mm (circular shapes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,

    /// Rotation in degrees (rotated shapes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccw_rotation: Option<f64>,

    /// Centre X in mm.
    pub x: f64,

    /// Centre Y in mm.
    pub y: f64,

    /// Aliases matching the pin this pad belongs to.
    #[serde(default)]
    pub port_hints: Vec<String>,
}

impl SmtPad {
    /// Returns `true` if this pad shares any hint with `hints`.
    #[must_use]
    pub fn matches_any(&self, hints: &[String]) -> bool {
        self.port_hints.iter().any(|h| hints.contains(h))
    }

    /// Returns the pad's bounding size `(width, height)` in mm.
    #[must_use]
    pub fn size(&self) -> (f64, f64) {
        match self.radius {
            Some(r) if self.shape == PadShape::Circle => (r * 2.0, r * 2.0),
            _ => (self.width.unwrap_or(0.0), self.height.unwrap_or(0.0)),
        }
    }
}

/// Dimension rewrite applied to pads saved with an old nominal size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadNormalization {
    /// Size that identifies a legacy pad (mm).
    pub legacy: f64,
    /// Size it is rewritten to (mm).
    pub nominal: f64,
}

/// Two dimensions closer than this are treated as the same size.
const SIZE_MATCH: f64 = 1e-9;

impl PadNormalization {
    fn rewrite(value: &mut Option<f64>, legacy: f64, nominal: f64) -> bool {
        match value {
            Some(v) if (*v - legacy).abs() < SIZE_MATCH => {
                *value = Some(nominal);
                true
            }
            _ => false,
        }
    }

    /// Rewrites a legacy-sized pad in place.
    ///
    /// Returns `true` if any dimension changed. Running it again on the same
    /// pad is a no-op as long as the nominal size differs from the legacy one.
    pub fn apply(self, pad: &mut SmtPad) -> bool {
        let w = Self::rewrite(&mut pad.width, self.legacy, self.nominal);
        let h = Self::rewrite(&mut pad.height, self.legacy, self.nominal);
        let r = Self::rewrite(&mut pad.radius, self.legacy / 2.0, self.nominal / 2.0);
        w || h || r
    }
}

/// The typed contents of a chip description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChipModel {
    /// Pins in declaration order.
    pub pins: Vec<SourcePort>,
    /// Declared nets in declaration order.
    pub nets: Vec<SourceNet>,
    /// Internal traces.
    pub traces: Vec<SourceTrace>,
    /// Physical pads.
    pub pads: Vec<SmtPad>,
}

impl ChipModel {
    /// Builds a chip model from a parsed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`InterconnectError::MalformedChip`] if `value` is neither an
    /// array nor an object with an `objects` array.
    pub fn from_value(
        value: &Value,
        normalization: Option<PadNormalization>,
    ) -> InterconnectResult<Self> {
        let records = match value {
            Value::Array(records) => records,
            Value::Object(map) => map
                .get("objects")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    InterconnectError::malformed_chip("object has no 'objects' array")
                })?,
            _ => {
                return Err(InterconnectError::malformed_chip(
                    "expected an array of records",
                ))
            }
        };

        let mut chip = Self::default();
        for (index, record) in records.iter().enumerate() {
            match record.get("type").and_then(Value::as_str) {
                Some("source_port") => push_record(&mut chip.pins, record, index),
                Some("source_net") => push_record(&mut chip.nets, record, index),
                Some("source_trace") => push_record(&mut chip.traces, record, index),
                Some("pcb_smtpad") => push_record(&mut chip.pads, record, index),
                _ => {}
            }
        }

        if let Some(normalization) = normalization {
            let rewritten = chip
                .pads
                .iter_mut()
                .map(|pad| normalization.apply(pad))
                .filter(|&changed| changed)
                .count();
            if rewritten > 0 {
                tracing::debug!(
                    rewritten,
                    legacy = normalization.legacy,
                    nominal = normalization.nominal,
                    "Normalised legacy pad sizes"
                );
            }
        }

        tracing::debug!(
            pins = chip.pins.len(),
            nets = chip.nets.len(),
            traces = chip.traces.len(),
            pads = chip.pads.len(),
            "Loaded chip model"
        );

        Ok(chip)
    }

    /// Parses a chip description from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or not a record list.
    pub fn from_json_str(
        json: &str,
        normalization: Option<PadNormalization>,
    ) -> InterconnectResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| InterconnectError::malformed_chip(format!("invalid JSON: {e}")))?;
        Self::from_value(&value, normalization)
    }

    /// Reads a chip description from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn read(
        path: impl AsRef<Path>,
        normalization: Option<PadNormalization>,
    ) -> InterconnectResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| InterconnectError::file_read(path, e))?;
        Self::from_json_str(&contents, normalization)
    }

    /// Finds the first pin carrying `hint`.
    #[must_use]
    pub fn pin_by_hint(&self, hint: &str) -> Option<&SourcePort> {
        self.pins.iter().find(|pin| pin.has_hint(hint))
    }

    /// Returns the pads that share a hint with any of `hints`, in stored order.
    #[must_use]
    pub fn pads_matching(&self, hints: &[String]) -> Vec<&SmtPad> {
        self.pads.iter().filter(|pad| pad.matches_any(hints)).collect()
    }
}

fn push_record<T: DeserializeOwned>(out: &mut Vec<T>, record: &Value, index: usize) {
    match T::deserialize(record) {
        Ok(parsed) => out.push(parsed),
        Err(e) => tracing::warn!(index, error = %e, "Skipping malformed chip record"),
    }
}
