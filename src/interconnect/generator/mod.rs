//! Fixture and footprint generation.
//!
//! Turns a prepared chip plus a snapshot of user connections into a new
//! flat record list. Both variants share one pipeline:
//!
//! 1. Component records
//! 2. One port per outer pin, keyed by its canonical net
//! 3. Nets: one per user connection, one auto-named net per other outer net
//! 4. One logical trace per connection with two or more pins
//! 5. Every chip pad re-emitted, with ports synthesised for inner pads;
//!    inner ports are appended to the traces of their nets
//! 6. (fixture) interconnect pad, test pad, fan-out trace and labels per outer pin
//! 7. (fixture) board sized by the busiest edge
//! 8. Bridge traces between consecutive `C` pins of each connection
//!
//! Any lookup the resolver cannot answer aborts generation.

pub mod layout;
pub mod records;

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::interconnect::bridge::{AdjacencyRules, BridgeFinder};
use crate::interconnect::chip::{Layer, SmtPad, SourceNet, SourcePort, SourceTrace};
use crate::interconnect::connections::UserConnection;
use crate::interconnect::error::{InterconnectError, InterconnectResult};
use crate::interconnect::netgroup::OuterPinNet;
use crate::interconnect::resolver::ConnectivityResolver;
use crate::interconnect::PreparedChip;

use layout::{FixtureLayout, LayoutRules};
use records::{
    Alignment, CircuitRecord, IdAllocator, PcbBoard, PcbComponent, PcbPort, PcbSilkscreenPath,
    PcbSilkscreenText, PcbSmtpad, PcbTrace, Point, SourceComponent,
};

/// Which circuit to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Bench fixture with test pads, board and labels.
    Fixture,
    /// Bare footprint with true-scale pads and routing only.
    Footprint,
}

/// Sizes and rules used during generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    /// Bridge adjacency limits.
    pub adjacency: AdjacencyRules,
    /// Test pad and board spacing.
    pub layout: LayoutRules,
    /// Test pad width (mm).
    pub test_pad_width: f64,
    /// Test pad height (mm).
    pub test_pad_height: f64,
    /// Side of the interconnect duplicate pad (mm).
    pub interconnect_pad_size: f64,
    /// Fan-out trace width (mm).
    pub trace_width: f64,
    /// Bridge trace width (mm).
    pub bridge_trace_width: f64,
    /// Label font size (mm).
    pub label_font_size: f64,
    /// Distance from a test pad to its label, towards the board centre (mm).
    pub label_offset: f64,
    /// Silkscreen line width (mm).
    pub silkscreen_width: f64,
    /// Reference designator of the generated component.
    pub component_name: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            adjacency: AdjacencyRules::default(),
            layout: LayoutRules::default(),
            test_pad_width: 1.5,
            test_pad_height: 1.5,
            interconnect_pad_size: 0.4,
            trace_width: 0.15,
            bridge_trace_width: 0.2,
            label_font_size: 0.8,
            label_offset: 1.6,
            silkscreen_width: 0.1,
            component_name: "U1".to_string(),
        }
    }
}

/// Counts of what a generation produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationSummary {
    /// Variant generated.
    pub variant: Option<Variant>,
    /// Total records.
    pub records: usize,
    /// Records per `type`, in first-emitted order.
    pub by_type: IndexMap<&'static str, usize>,
    /// Bridge traces emitted.
    pub bridges: usize,
    /// Board side (fixture only, mm).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_size: Option<f64>,
}

/// A generated circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generation {
    /// The record list.
    pub records: Vec<CircuitRecord>,
    /// Counts.
    pub summary: GenerationSummary,
}

/// Generates a circuit for `connections` on `chip`.
///
/// The resolver is private to this call; nothing is kept between calls, so
/// identical inputs give identical output.
///
/// # Errors
///
/// Returns an error if a connection names an unknown pin or a pad has no
/// resolvable hint.
pub fn generate(
    chip: &PreparedChip,
    connections: &[UserConnection],
    settings: &GeneratorSettings,
    variant: Variant,
) -> InterconnectResult<Generation> {
    let resolver = chip.resolver_for(connections)?;
    let mut emitter = Emitter::new(chip, connections, settings, resolver);

    emitter.emit_component(variant);
    emitter.emit_outer_ports()?;
    emitter.emit_nets()?;
    emitter.emit_traces()?;
    emitter.emit_pads()?;
    let board_size = match variant {
        Variant::Fixture => Some(emitter.emit_test_pads()?),
        Variant::Footprint => None,
    };
    let bridges = emitter.emit_bridges()?;

    let records = emitter.records;
    let mut by_type = IndexMap::new();
    for record in &records {
        *by_type.entry(record.kind()).or_insert(0) += 1;
    }
    let summary = GenerationSummary {
        variant: Some(variant),
        records: records.len(),
        by_type,
        bridges,
        board_size,
    };

    tracing::info!(
        variant = ?variant,
        records = summary.records,
        bridges,
        "Generated circuit"
    );

    Ok(Generation { records, summary })
}

/// Mutable state of one generation call.
struct Emitter<'a> {
    chip: &'a PreparedChip,
    connections: &'a [UserConnection],
    settings: &'a GeneratorSettings,
    resolver: ConnectivityResolver,
    ids: IdAllocator,
    records: Vec<CircuitRecord>,
    source_component_id: String,
    pcb_component_id: String,
    /// Chip pin id to emitted source port id.
    ports_by_pin: HashMap<String, String>,
    /// Emitted source port ids, in emission order.
    ports: Vec<String>,
    /// Source port id to its first pcb port id.
    pcb_ports: HashMap<String, String>,
    /// Canonical net id to emitted net id.
    nets: IndexMap<String, String>,
    /// Canonical net id to index of its `source_trace` record.
    traces: HashMap<String, usize>,
}

impl<'a> Emitter<'a> {
    fn new(
        chip: &'a PreparedChip,
        connections: &'a [UserConnection],
        settings: &'a GeneratorSettings,
        resolver: ConnectivityResolver,
    ) -> Self {
        Self {
            chip,
            connections,
            settings,
            resolver,
            ids: IdAllocator::default(),
            records: Vec::new(),
            source_component_id: String::new(),
            pcb_component_id: String::new(),
            ports_by_pin: HashMap::new(),
            ports: Vec::new(),
            pcb_ports: HashMap::new(),
            nets: IndexMap::new(),
            traces: HashMap::new(),
        }
    }

    /// Outer pins with the chip pad they land on, in catalogue order.
    fn outer_pads(&self) -> Vec<(&'a OuterPinNet, &'a SmtPad)> {
        let chip = self.chip;
        chip.catalogue
            .iter()
            .filter_map(|net| {
                let pad = chip
                    .model
                    .pads
                    .iter()
                    .find(|pad| pad.matches_any(&net.outer_pin().port_hints));
                if pad.is_none() {
                    tracing::warn!(pin = %net.display_name, "Outer pin has no pad");
                }
                pad.map(|pad| (net, pad))
            })
            .collect()
    }

    fn connection_of(&self, display_name: &str) -> Option<&'a UserConnection> {
        self.connections.iter().find(|c| c.contains(display_name))
    }

    fn emit_component(&mut self, variant: Variant) {
        self.source_component_id = self.ids.next("source_component");
        self.pcb_component_id = self.ids.next("pcb_component");

        let (width, height) = match variant {
            Variant::Fixture => {
                let size = self.plan().board_size;
                (size, size)
            }
            Variant::Footprint => {
                let (min, max) = self.pad_extent();
                (max.x - min.x, max.y - min.y)
            }
        };

        self.records
            .push(CircuitRecord::SourceComponent(SourceComponent {
                source_component_id: self.source_component_id.clone(),
                name: self.settings.component_name.clone(),
                ftype: "simple_chip".to_string(),
            }));
        self.records.push(CircuitRecord::PcbComponent(PcbComponent {
            pcb_component_id: self.pcb_component_id.clone(),
            source_component_id: self.source_component_id.clone(),
            center: Point::default(),
            width,
            height,
            layer: Layer::Top,
            rotation: 0.0,
        }));
    }

    fn plan(&self) -> FixtureLayout {
        let positions: Vec<Point> = self
            .outer_pads()
            .iter()
            .map(|(_, pad)| Point::new(pad.x, pad.y))
            .collect();
        FixtureLayout::plan(&positions, &self.settings.layout)
    }

    /// Bounding box of all chip pads, including pad size.
    fn pad_extent(&self) -> (Point, Point) {
        let mut min = Point::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for pad in &self.chip.model.pads {
            let (w, h) = pad.size();
            min.x = min.x.min(pad.x - w / 2.0);
            min.y = min.y.min(pad.y - h / 2.0);
            max.x = max.x.max(pad.x + w / 2.0);
            max.y = max.y.max(pad.y + h / 2.0);
        }
        if min.x > max.x {
            return (Point::default(), Point::default());
        }
        (min, max)
    }

    /// Emits a source port and registers its id with the resolver.
    fn push_port(
        &mut self,
        template: &SourcePort,
        name: String,
        net_hint: &str,
    ) -> InterconnectResult<String> {
        let canonical = self.resolver.resolve(net_hint)?.to_string();
        let id = self.ids.next("source_port");
        self.resolver.register(&id, net_hint)?;

        self.records.push(CircuitRecord::SourcePort(SourcePort {
            source_port_id: id.clone(),
            name,
            pin_number: template.pin_number,
            port_hints: template.port_hints.clone(),
            subcircuit_connectivity_map_key: canonical,
            source_component_id: Some(self.source_component_id.clone()),
            subcircuit_id: None,
        }));
        self.ports.push(id.clone());
        if !template.source_port_id.is_empty() {
            self.ports_by_pin
                .insert(template.source_port_id.clone(), id.clone());
        }
        Ok(id)
    }

    fn emit_outer_ports(&mut self) -> InterconnectResult<()> {
        let chip = self.chip;
        for net in chip.catalogue.iter() {
            self.push_port(net.outer_pin(), net.display_name.clone(), &net.display_name)?;
        }
        Ok(())
    }

    fn push_net(&mut self, canonical: &str, name: String) {
        let id = self.ids.next("source_net");
        self.records.push(CircuitRecord::SourceNet(SourceNet {
            source_net_id: id.clone(),
            name,
            subcircuit_connectivity_map_key: canonical.to_string(),
        }));
        self.nets.insert(canonical.to_string(), id);
    }

    fn emit_nets(&mut self) -> InterconnectResult<()> {
        for connection in self.connections {
            let Some(first) = connection.outer_pin_names.first() else {
                continue;
            };
            let canonical = self.resolver.resolve(first)?.to_string();
            if self.nets.contains_key(&canonical) {
                tracing::warn!(
                    connection = %connection.id,
                    "Connection shares a net with an earlier connection"
                );
                continue;
            }
            self.push_net(&canonical, connection.name.clone());
        }

        let chip = self.chip;
        for net in chip.catalogue.iter() {
            let canonical = self.resolver.resolve(&net.display_name)?.to_string();
            if !self.nets.contains_key(&canonical) {
                self.push_net(&canonical, format!("NET_{}", net.display_name));
            }
        }
        Ok(())
    }

    fn ports_on(&self, canonical: &str) -> InterconnectResult<Vec<String>> {
        let mut members = Vec::new();
        for port in &self.ports {
            if self.resolver.resolve(port)? == canonical {
                members.push(port.clone());
            }
        }
        Ok(members)
    }

    fn emit_traces(&mut self) -> InterconnectResult<()> {
        for connection in self.connections {
            if connection.outer_pin_names.len() < 2 {
                continue;
            }
            let canonical = self.resolver.resolve(&connection.outer_pin_names[0])?.to_string();
            if self.traces.contains_key(&canonical) {
                continue;
            }
            let members = self.ports_on(&canonical)?;
            let net_ids = self.nets.get(&canonical).cloned().into_iter().collect();

            let id = self.ids.next("source_trace");
            self.traces.insert(canonical.clone(), self.records.len());
            self.records.push(CircuitRecord::SourceTrace(SourceTrace {
                source_trace_id: id,
                connected_source_port_ids: members,
                connected_source_net_ids: net_ids,
                subcircuit_connectivity_map_key: Some(canonical),
            }));
        }
        Ok(())
    }

    /// Appends a late port to the trace of its net, if the net has one.
    fn extend_trace(&mut self, canonical: &str, port: &str) {
        let Some(&index) = self.traces.get(canonical) else {
            return;
        };
        if let CircuitRecord::SourceTrace(trace) = &mut self.records[index] {
            if !trace.connected_source_port_ids.iter().any(|p| p == port) {
                trace.connected_source_port_ids.push(port.to_string());
            }
        }
    }

    fn emit_pads(&mut self) -> InterconnectResult<()> {
        let chip = self.chip;
        for pad in &chip.model.pads {
            let pin = chip
                .model
                .pins
                .iter()
                .find(|pin| pad.matches_any(&pin.port_hints));

            let existing = pin.and_then(|pin| self.ports_by_pin.get(&pin.source_port_id).cloned());
            let port = match existing {
                Some(port) => port,
                None => self.synthesise_port(pad, pin)?,
            };

            let pcb_port_id = self.ids.next("pcb_port");
            self.records.push(CircuitRecord::PcbPort(PcbPort {
                pcb_port_id: pcb_port_id.clone(),
                source_port_id: port.clone(),
                pcb_component_id: self.pcb_component_id.clone(),
                x: pad.x,
                y: pad.y,
                layers: vec![pad.layer],
            }));
            self.pcb_ports.entry(port).or_insert_with(|| pcb_port_id.clone());

            let pad_id = self.ids.next("pcb_smtpad");
            self.records.push(CircuitRecord::PcbSmtpad(PcbSmtpad::from_chip_pad(
                pad,
                pad_id,
                self.pcb_component_id.clone(),
                Some(pcb_port_id),
            )));
        }
        Ok(())
    }

    /// Creates the port for a pad no outer pin claimed.
    fn synthesise_port(
        &mut self,
        pad: &SmtPad,
        pin: Option<&SourcePort>,
    ) -> InterconnectResult<String> {
        let hints = pin.map_or(&pad.port_hints, |pin| &pin.port_hints);
        let Some(net_hint) = hints
            .iter()
            .chain(&pad.port_hints)
            .find(|hint| self.resolver.contains(hint))
            .cloned()
        else {
            return Err(InterconnectError::UnresolvedPad {
                pad_id: pad.pcb_smtpad_id.clone(),
                hints: pad.port_hints.clone(),
            });
        };

        let template = pin.cloned().unwrap_or_else(|| SourcePort {
            source_port_id: String::new(),
            name: net_hint.clone(),
            pin_number: 0,
            port_hints: pad.port_hints.clone(),
            subcircuit_connectivity_map_key: String::new(),
            source_component_id: None,
            subcircuit_id: None,
        });
        let name = if template.name.is_empty() {
            net_hint.clone()
        } else {
            template.name.clone()
        };

        let port = self.push_port(&template, name.clone(), &net_hint)?;
        let canonical = self.resolver.resolve(&port)?.to_string();
        if !self.nets.contains_key(&canonical) {
            self.push_net(&canonical, format!("NET_{name}"));
        }
        self.extend_trace(&canonical, &port);
        tracing::trace!(port = %port, net = %canonical, "Synthesised inner port");
        Ok(port)
    }

    /// Emits the fixture presentation. Returns the board size.
    fn emit_test_pads(&mut self) -> InterconnectResult<f64> {
        let settings = self.settings;
        let outer = self.outer_pads();
        let plan = self.plan();

        for ((net, pad), slot) in outer.iter().zip(&plan.slots) {
            let pin_id = &net.outer_pin().source_port_id;
            let port = self
                .ports_by_pin
                .get(pin_id)
                .cloned()
                .ok_or_else(|| InterconnectError::unresolved_hint(pin_id.as_str()))?;
            let canonical = self.resolver.resolve(&port)?.to_string();
            let pad_center = Point::new(pad.x, pad.y);

            let interconnect_id = self.ids.next("pcb_smtpad");
            self.records.push(CircuitRecord::PcbSmtpad(PcbSmtpad::rect(
                interconnect_id,
                self.pcb_component_id.clone(),
                self.pcb_ports.get(&port).cloned(),
                pad_center,
                settings.interconnect_pad_size,
                settings.interconnect_pad_size,
            )));

            let test_port_id = self.ids.next("pcb_port");
            self.records.push(CircuitRecord::PcbPort(PcbPort {
                pcb_port_id: test_port_id.clone(),
                source_port_id: port.clone(),
                pcb_component_id: self.pcb_component_id.clone(),
                x: slot.position.x,
                y: slot.position.y,
                layers: vec![Layer::Top],
            }));
            let test_pad_id = self.ids.next("pcb_smtpad");
            self.records.push(CircuitRecord::PcbSmtpad(PcbSmtpad::rect(
                test_pad_id,
                self.pcb_component_id.clone(),
                Some(test_port_id),
                slot.position,
                settings.test_pad_width,
                settings.test_pad_height,
            )));

            let mut fan_out = PcbTrace::wire(
                self.ids.next("pcb_trace"),
                pad_center,
                slot.position,
                settings.trace_width,
            );
            fan_out.source_trace_id = self.trace_id(&canonical);
            fan_out.subcircuit_connectivity_map_key = Some(canonical);
            self.records.push(CircuitRecord::PcbTrace(fan_out));

            let (ox, oy) = slot.edge.outward();
            let label = Point::new(
                slot.position.x - ox * settings.label_offset,
                slot.position.y - oy * settings.label_offset,
            );
            self.push_text(net.display_name.clone(), label);
            if let Some(connection) = self.connection_of(&net.display_name) {
                let below = Point::new(label.x, label.y - settings.label_font_size * 1.25);
                self.push_text(connection.name.clone(), below);
            }
        }

        self.records.push(CircuitRecord::PcbBoard(PcbBoard {
            pcb_board_id: self.ids.next("pcb_board"),
            center: Point::default(),
            width: plan.board_size,
            height: plan.board_size,
            thickness: 1.6,
            num_layers: 2,
        }));

        let (min, max) = self.pad_extent();
        let margin = settings.silkscreen_width * 5.0;
        self.records
            .push(CircuitRecord::PcbSilkscreenPath(PcbSilkscreenPath {
                pcb_silkscreen_path_id: self.ids.next("pcb_silkscreen_path"),
                pcb_component_id: self.pcb_component_id.clone(),
                route: vec![
                    Point::new(min.x - margin, min.y - margin),
                    Point::new(max.x + margin, min.y - margin),
                    Point::new(max.x + margin, max.y + margin),
                    Point::new(min.x - margin, max.y + margin),
                    Point::new(min.x - margin, min.y - margin),
                ],
                stroke_width: settings.silkscreen_width,
                layer: Layer::Top,
            }));

        tracing::debug!(
            test_pads = outer.len(),
            board = plan.board_size,
            "Placed test pads"
        );
        Ok(plan.board_size)
    }

    fn push_text(&mut self, text: String, at: Point) {
        self.records
            .push(CircuitRecord::PcbSilkscreenText(PcbSilkscreenText {
                pcb_silkscreen_text_id: self.ids.next("pcb_silkscreen_text"),
                pcb_component_id: self.pcb_component_id.clone(),
                text,
                anchor_position: at,
                anchor_alignment: Alignment::Center,
                font_size: self.settings.label_font_size,
                layer: Layer::Top,
            }));
    }

    fn trace_id(&self, canonical: &str) -> Option<String> {
        let index = *self.traces.get(canonical)?;
        match &self.records[index] {
            CircuitRecord::SourceTrace(trace) => Some(trace.source_trace_id.clone()),
            _ => None,
        }
    }

    /// Emits bridge traces. Returns how many were emitted.
    fn emit_bridges(&mut self) -> InterconnectResult<usize> {
        let chip = self.chip;
        let finder = BridgeFinder::new(&chip.model, self.settings.adjacency);
        let mut count = 0;

        for connection in self.connections {
            for link in finder.chain(&chip.catalogue, &connection.outer_pin_names) {
                let from = link.bridge.from;
                let canonical = self
                    .resolver
                    .resolve_any(&from.port_hints)
                    .ok_or_else(|| InterconnectError::UnresolvedPad {
                        pad_id: from.pcb_smtpad_id.clone(),
                        hints: from.port_hints.clone(),
                    })?
                    .to_string();

                let mut trace = PcbTrace::wire(
                    self.ids.next("pcb_trace"),
                    Point::new(from.x, from.y),
                    Point::new(link.bridge.to.x, link.bridge.to.y),
                    self.settings.bridge_trace_width,
                );
                trace.source_trace_id = self.trace_id(&canonical);
                trace.subcircuit_connectivity_map_key = Some(canonical);
                self.records.push(CircuitRecord::PcbTrace(trace));
                count += 1;

                tracing::debug!(
                    connection = %connection.id,
                    from = %link.from_pin,
                    to = %link.to_pin,
                    "Bridged pins"
                );
            }
        }
        Ok(count)
    }
}
