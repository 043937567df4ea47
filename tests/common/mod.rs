//! Synthetic 100-pin chip shared by the integration tests.
//!
//! Pins sit on a 10x10 grid at 1mm pitch, centred on the origin. The 36 ring
//! positions are numbered clockwise from the top-left corner; even positions
//! are `C` pins, odd positions are `X` pins. `X` pins at ring `i` and
//! `i + 18` mirror each other through the centre, so `X<k>` pairs with
//! `X<k + 9>`.
//!
//! Each `C` pin's net also owns one inner pin, stepped inward from the ring
//! position that follows it. That inner pad touches the next `C` pin's pad,
//! so consecutive `C` pins along the top row (`C1`..`C5`) can be bridged;
//! `C` pins two apart cannot. All remaining inner pins are single-pin nets.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use interconnect_fixture::interconnect::{ChipModel, PreparedChip, UserConnection};
use serde_json::{json, Value};

/// Grid side.
pub const SIDE: usize = 10;

/// Ring positions.
pub const RING: usize = 36;

/// `(row, col)` of ring position `i`, clockwise from the top-left corner.
pub fn ring_position(i: usize) -> (usize, usize) {
    match i {
        0..=9 => (0, i),
        10..=18 => (i - 9, 9),
        19..=27 => (9, 27 - i),
        _ => (36 - i, 0),
    }
}

/// Pad centre of grid cell `(row, col)` in mm.
#[allow(clippy::cast_precision_loss)]
pub fn cell_center(row: usize, col: usize) -> (f64, f64) {
    (col as f64 - 4.5, 4.5 - row as f64)
}

fn pin_number(row: usize, col: usize) -> usize {
    row * SIDE + col + 1
}

/// Steps one cell towards the centre.
fn inward(row: usize, col: usize) -> (usize, usize) {
    (row.clamp(1, SIDE - 2), col.clamp(1, SIDE - 2))
}

/// Role hint of ring position `i`.
pub fn role(i: usize) -> String {
    if i % 2 == 0 {
        format!("C{}", i / 2 + 1)
    } else {
        format!("X{}", i.div_ceil(2))
    }
}

/// Builds the chip record list. `legacy_pads` gives every pad the old
/// 0.3mm size.
pub fn chip_records_with(legacy_pads: bool) -> Value {
    // Cell -> (role, connectivity key)
    let mut cells: HashMap<(usize, usize), (Option<String>, String)> = HashMap::new();
    for i in 0..RING {
        let role = role(i);
        cells.insert(ring_position(i), (Some(role.clone()), format!("net_{role}")));
    }
    for i in (0..RING).step_by(2) {
        let (r, c) = ring_position((i + 1) % RING);
        cells
            .entry(inward(r, c))
            .or_insert_with(|| (None, format!("net_{}", role(i))));
    }

    let size = if legacy_pads { 0.3 } else { 0.5 };
    let mut ports = Vec::new();
    let mut pads = Vec::new();
    let mut inner = 0;
    for row in 0..SIDE {
        for col in 0..SIDE {
            let n = pin_number(row, col);
            let (role, key) = match cells.get(&(row, col)) {
                Some((role, key)) => (role.clone(), key.clone()),
                None => (None, format!("net_in_{row}_{col}")),
            };
            let tag = role.unwrap_or_else(|| {
                inner += 1;
                format!("IN{inner}_R{row}_C{col}")
            });
            ports.push(json!({
                "type": "source_port",
                "source_port_id": format!("source_port_{n}"),
                "name": format!("pin{n}"),
                "pin_number": n,
                "port_hints": [format!("pin{n}"), tag],
                "subcircuit_connectivity_map_key": key,
                "source_component_id": "chip",
            }));
            let (x, y) = cell_center(row, col);
            pads.push(json!({
                "type": "pcb_smtpad",
                "pcb_smtpad_id": format!("pcb_smtpad_{n}"),
                "layer": "top",
                "shape": "rect",
                "width": size,
                "height": size,
                "x": x,
                "y": y,
                "port_hints": [format!("pin{n}")],
            }));
        }
    }

    let nets: Vec<Value> = (0..RING)
        .map(|i| {
            let role = role(i);
            json!({
                "type": "source_net",
                "source_net_id": format!("source_net_{role}"),
                "name": format!("N_{role}"),
                "subcircuit_connectivity_map_key": format!("net_{role}"),
            })
        })
        .collect();

    let records: Vec<Value> = ports
        .into_iter()
        .chain(nets)
        .chain(pads)
        .chain(std::iter::once(json!({ "type": "source_component", "name": "chip" })))
        .collect();
    json!({ "objects": records })
}

/// The chip record list with nominal pads.
pub fn chip_records() -> Value {
    chip_records_with(false)
}

/// The chip, loaded and prepared.
pub fn chip() -> PreparedChip {
    PreparedChip::new(ChipModel::from_value(&chip_records(), None).expect("synthetic chip loads"))
}

/// Writes the chip to `dir/chip.json`.
pub fn write_chip(dir: &Path) -> PathBuf {
    let path = dir.join("chip.json");
    std::fs::write(&path, serde_json::to_string_pretty(&chip_records()).unwrap()).unwrap();
    path
}

/// A connection with the given pins.
pub fn connection(id: &str, name: &str, pins: &[&str]) -> UserConnection {
    let mut connection = UserConnection::new(id, name, "#e6194b");
    connection.outer_pin_names = pins.iter().map(ToString::to_string).collect();
    connection
}
