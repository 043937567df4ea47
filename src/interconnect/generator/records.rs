//! Output record types.
//!
//! Generated circuits use the same flat, `type`-tagged record convention as
//! the chip description. All geometry is in millimetres.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::interconnect::chip::{Layer, PadShape, SmtPad, SourceNet, SourcePort, SourceTrace};

/// A 2D point (mm).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate (mm).
    pub x: f64,
    /// Y coordinate (mm).
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The top-level logical component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceComponent {
    /// Record identifier.
    pub source_component_id: String,
    /// Reference designator.
    pub name: String,
    /// Functional type.
    pub ftype: String,
}

/// Physical placement of the component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcbComponent {
    /// Record identifier.
    pub pcb_component_id: String,
    /// Logical component.
    pub source_component_id: String,
    /// Centre position.
    pub center: Point,
    /// Width (mm).
    pub width: f64,
    /// Height (mm).
    pub height: f64,
    /// Placement layer.
    pub layer: Layer,
    /// Rotation in degrees.
    pub rotation: f64,
}

/// The fixture board outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcbBoard {
    /// Record identifier.
    pub pcb_board_id: String,
    /// Centre position.
    pub center: Point,
    /// Width (mm).
    pub width: f64,
    /// Height (mm).
    pub height: f64,
    /// Board thickness (mm).
    pub thickness: f64,
    /// Copper layer count.
    pub num_layers: u32,
}

/// A copper pad on the generated circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcbSmtpad {
    /// Record identifier.
    pub pcb_smtpad_id: String,
    /// Owning component.
    pub pcb_component_id: String,
    /// Port this pad lands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcb_port_id: Option<String>,
    /// Layer.
    pub layer: Layer,
    /// Shape.
    pub shape: PadShape,
    /// Width (mm).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Height (mm).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Radius (mm), circular pads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Rotation in degrees, rotated pads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccw_rotation: Option<f64>,
    /// Centre X (mm).
    pub x: f64,
    /// Centre Y (mm).
    pub y: f64,
    /// Hints tying the pad to its port.
    #[serde(default)]
    pub port_hints: Vec<String>,
}

impl PcbSmtpad {
    /// Copies a chip pad, keeping its shape, size and position.
    #[must_use]
    pub fn from_chip_pad(
        pad: &SmtPad,
        pcb_smtpad_id: String,
        pcb_component_id: String,
        pcb_port_id: Option<String>,
    ) -> Self {
        Self {
            pcb_smtpad_id,
            pcb_component_id,
            pcb_port_id,
            layer: pad.layer,
            shape: pad.shape,
            width: pad.width,
            height: pad.height,
            radius: pad.radius,
            ccw_rotation: pad.ccw_rotation,
            x: pad.x,
            y: pad.y,
            port_hints: pad.port_hints.clone(),
        }
    }

    /// Creates a rectangular top-layer pad.
    #[must_use]
    pub fn rect(
        pcb_smtpad_id: String,
        pcb_component_id: String,
        pcb_port_id: Option<String>,
        center: Point,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            pcb_smtpad_id,
            pcb_component_id,
            pcb_port_id,
            layer: Layer::Top,
            shape: PadShape::Rect,
            width: Some(width),
            height: Some(height),
            radius: None,
            ccw_rotation: None,
            x: center.x,
            y: center.y,
            port_hints: Vec::new(),
        }
    }
}

/// Physical landing point of a port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcbPort {
    /// Record identifier.
    pub pcb_port_id: String,
    /// Logical port.
    pub source_port_id: String,
    /// Owning component.
    pub pcb_component_id: String,
    /// X (mm).
    pub x: f64,
    /// Y (mm).
    pub y: f64,
    /// Layers the port is reachable on.
    pub layers: Vec<Layer>,
}

/// Route segment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    /// Copper wire.
    #[default]
    Wire,
}

/// One vertex of a copper route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    /// Segment kind.
    pub route_type: RouteType,
    /// X (mm).
    pub x: f64,
    /// Y (mm).
    pub y: f64,
    /// Copper width (mm).
    pub width: f64,
    /// Layer.
    pub layer: Layer,
}

/// A copper trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcbTrace {
    /// Record identifier.
    pub pcb_trace_id: String,
    /// Logical trace this copper implements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_trace_id: Option<String>,
    /// Canonical net of the copper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcircuit_connectivity_map_key: Option<String>,
    /// Vertices.
    pub route: Vec<RoutePoint>,
}

impl PcbTrace {
    /// A straight top-layer wire between two points.
    #[must_use]
    pub fn wire(pcb_trace_id: String, from: Point, to: Point, width: f64) -> Self {
        let vertex = |p: Point| RoutePoint {
            route_type: RouteType::Wire,
            x: p.x,
            y: p.y,
            width,
            layer: Layer::Top,
        };
        Self {
            pcb_trace_id,
            source_trace_id: None,
            subcircuit_connectivity_map_key: None,
            route: vec![vertex(from), vertex(to)],
        }
    }
}

/// Text anchor alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Anchored at the text centre.
    #[default]
    Center,
}

/// A silkscreen label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcbSilkscreenText {
    /// Record identifier.
    pub pcb_silkscreen_text_id: String,
    /// Owning component.
    pub pcb_component_id: String,
    /// Label text.
    pub text: String,
    /// Anchor position.
    pub anchor_position: Point,
    /// Anchor alignment.
    pub anchor_alignment: Alignment,
    /// Font size (mm).
    pub font_size: f64,
    /// Layer.
    pub layer: Layer,
}

/// A silkscreen polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcbSilkscreenPath {
    /// Record identifier.
    pub pcb_silkscreen_path_id: String,
    /// Owning component.
    pub pcb_component_id: String,
    /// Vertices.
    pub route: Vec<Point>,
    /// Line width (mm).
    pub stroke_width: f64,
    /// Layer.
    pub layer: Layer,
}

/// One record of a generated circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CircuitRecord {
    /// `source_component`
    SourceComponent(SourceComponent),
    /// `pcb_component`
    PcbComponent(PcbComponent),
    /// `pcb_board`
    PcbBoard(PcbBoard),
    /// `source_port`
    SourcePort(SourcePort),
    /// `source_net`
    SourceNet(SourceNet),
    /// `source_trace`
    SourceTrace(SourceTrace),
    /// `pcb_smtpad`
    PcbSmtpad(PcbSmtpad),
    /// `pcb_port`
    PcbPort(PcbPort),
    /// `pcb_trace`
    PcbTrace(PcbTrace),
    /// `pcb_silkscreen_text`
    PcbSilkscreenText(PcbSilkscreenText),
    /// `pcb_silkscreen_path`
    PcbSilkscreenPath(PcbSilkscreenPath),
}

impl CircuitRecord {
    /// The record's `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SourceComponent(_) => "source_component",
            Self::PcbComponent(_) => "pcb_component",
            Self::PcbBoard(_) => "pcb_board",
            Self::SourcePort(_) => "source_port",
            Self::SourceNet(_) => "source_net",
            Self::SourceTrace(_) => "source_trace",
            Self::PcbSmtpad(_) => "pcb_smtpad",
            Self::PcbPort(_) => "pcb_port",
            Self::PcbTrace(_) => "pcb_trace",
            Self::PcbSilkscreenText(_) => "pcb_silkscreen_text",
            Self::PcbSilkscreenPath(_) => "pcb_silkscreen_path",
        }
    }
}

/// Hands out sequential ids per record type (`source_port_0`, `source_port_1`, ...).
#[derive(Debug, Default)]
pub struct IdAllocator {
    counters: HashMap<&'static str, usize>,
}

impl IdAllocator {
    /// Returns the next id for `kind`.
    pub fn next(&mut self, kind: &'static str) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        let id = format!("{kind}_{counter}");
        *counter += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_per_kind() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.next("source_port"), "source_port_0");
        assert_eq!(ids.next("source_port"), "source_port_1");
        assert_eq!(ids.next("source_net"), "source_net_0");
    }

    #[test]
    fn records_are_type_tagged() {
        let record = CircuitRecord::PcbSilkscreenText(PcbSilkscreenText {
            pcb_silkscreen_text_id: "pcb_silkscreen_text_0".to_string(),
            pcb_component_id: "pcb_component_0".to_string(),
            text: "C1".to_string(),
            anchor_position: Point::new(1.0, 2.0),
            anchor_alignment: Alignment::Center,
            font_size: 0.8,
            layer: Layer::Top,
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "pcb_silkscreen_text");
        assert_eq!(value["anchor_alignment"], "center");
        assert_eq!(record.kind(), "pcb_silkscreen_text");
    }

    #[test]
    fn wire_has_two_vertices() {
        let trace = PcbTrace::wire(
            "pcb_trace_0".to_string(),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            0.15,
        );
        let value = serde_json::to_value(&trace).unwrap();
        assert_eq!(value["route"][0]["route_type"], "wire");
        assert_eq!(value["route"][1]["x"], 1.0);
        assert!(value.get("source_trace_id").is_none());
    }
}
