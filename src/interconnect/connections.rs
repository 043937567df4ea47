//! User connections and the rules for editing them.
//!
//! A [`UserConnection`] is an ordered list of outer-pin display names that
//! the user wants tied into one net. [`ConnectionSet`] applies the editing
//! policy so that every snapshot handed to the generator is valid:
//!
//! - `C` and `X` pins never share a connection.
//! - A connection holds at most one diagonal `X` pair, and adding either
//!   half of a pair brings in the other.
//! - A pin belongs to at most one connection.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::interconnect::chip::ChipModel;
use crate::interconnect::error::{InterconnectError, InterconnectResult};
use crate::interconnect::netgroup::{OuterPinCatalogue, OuterPinNet, PinKind};

/// Colours handed out to new connections, in order.
pub const PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
    "#469990", "#9a6324",
];

/// Returns the palette colour for the `index`-th connection.
#[must_use]
pub fn next_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// A user-authored grouping of outer pins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConnection {
    /// Unique identifier.
    pub id: String,
    /// Display name; becomes the generated net's name.
    pub name: String,
    /// Outer-pin display names in routing order.
    #[serde(default)]
    pub outer_pin_names: Vec<String>,
    /// Display colour.
    #[serde(default)]
    pub color: String,
}

impl UserConnection {
    /// Creates an empty connection.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            outer_pin_names: Vec::new(),
            color: color.into(),
        }
    }

    /// Returns `true` if the connection lists `pin`.
    #[must_use]
    pub fn contains(&self, pin: &str) -> bool {
        self.outer_pin_names.iter().any(|p| p == pin)
    }
}

/// Fixed partner of every `X` pin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagonalPairs {
    partners: HashMap<String, String>,
}

impl DiagonalPairs {
    /// Builds the table from explicit pairs.
    #[must_use]
    pub fn from_pairs<S: AsRef<str>>(pairs: &[[S; 2]]) -> Self {
        let mut partners = HashMap::new();
        for [a, b] in pairs {
            partners.insert(a.as_ref().to_string(), b.as_ref().to_string());
            partners.insert(b.as_ref().to_string(), a.as_ref().to_string());
        }
        Self { partners }
    }

    /// Pairs each `X` pin with the `X` pin whose pad mirrors it through the
    /// chip centre, within `tolerance` mm on each axis.
    ///
    /// Each pin takes the candidate closest to its mirror point. A pair is
    /// kept only when both pins pick each other.
    #[must_use]
    pub fn by_reflection(chip: &ChipModel, catalogue: &OuterPinCatalogue, tolerance: f64) -> Self {
        let outer_pad = |net: &OuterPinNet| {
            chip.pads
                .iter()
                .find(|pad| pad.matches_any(&net.outer_pin().port_hints))
                .map(|pad| (pad.x, pad.y))
        };

        let x_pins: Vec<(&str, (f64, f64))> = catalogue
            .iter()
            .filter(|net| net.kind == PinKind::X)
            .filter_map(|net| outer_pad(net).map(|pos| (net.display_name.as_str(), pos)))
            .collect();

        // Closest X pad to each pin's mirror point, within tolerance per axis.
        let nearest: HashMap<&str, &str> = x_pins
            .iter()
            .filter_map(|&(name, (x, y))| {
                x_pins
                    .iter()
                    .filter(|&&(other, (ox, oy))| {
                        other != name
                            && (ox + x).abs() <= tolerance
                            && (oy + y).abs() <= tolerance
                    })
                    .min_by(|&&(_, (ax, ay)), &&(_, (bx, by))| {
                        (ax + x).hypot(ay + y).total_cmp(&(bx + x).hypot(by + y))
                    })
                    .map(|&(other, _)| (name, other))
            })
            .collect();

        let mut partners = HashMap::new();
        for &(name, _) in &x_pins {
            match nearest.get(name) {
                Some(&other) if nearest.get(other) == Some(&name) => {
                    partners.insert(name.to_string(), other.to_string());
                }
                Some(&other) => tracing::warn!(
                    pin = %name,
                    nearest = %other,
                    "Mirror of X pin does not point back"
                ),
                None => tracing::warn!(pin = %name, "X pin has no diagonal partner"),
            }
        }

        tracing::debug!(pairs = partners.len() / 2, "Derived diagonal X pairs");
        Self { partners }
    }

    /// Returns the partner of `pin`, if it has one.
    #[must_use]
    pub fn partner(&self, pin: &str) -> Option<&str> {
        self.partners.get(pin).map(String::as_str)
    }
}

/// The editable list of user connections for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionSet {
    connections: Vec<UserConnection>,
}

impl ConnectionSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connections: Vec::new(),
        }
    }

    /// The connections in creation order, as handed to the generator.
    #[must_use]
    pub fn snapshot(&self) -> &[UserConnection] {
        &self.connections
    }

    /// Number of connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if there are no connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Looks up a connection by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&UserConnection> {
        self.connections.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> InterconnectResult<&mut UserConnection> {
        self.connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| InterconnectError::unknown_connection(id))
    }

    /// Returns the connection that lists `pin`.
    #[must_use]
    pub fn owner_of(&self, pin: &str) -> Option<&UserConnection> {
        self.connections.iter().find(|c| c.contains(pin))
    }

    /// Adds an empty connection.
    ///
    /// # Errors
    ///
    /// Returns [`InterconnectError::DuplicateConnection`] if `id` is taken.
    pub fn create(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        color: Option<String>,
    ) -> InterconnectResult<&UserConnection> {
        let id = id.into();
        if self.get(&id).is_some() {
            return Err(InterconnectError::DuplicateConnection { id });
        }
        let color = color.unwrap_or_else(|| next_color(self.connections.len()).to_string());
        self.connections.push(UserConnection::new(id, name, color));
        Ok(&self.connections[self.connections.len() - 1])
    }

    /// Renames a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection does not exist.
    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> InterconnectResult<()> {
        self.get_mut(id)?.name = name.into();
        Ok(())
    }

    /// Changes a connection's colour.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection does not exist.
    pub fn set_color(&mut self, id: &str, color: impl Into<String>) -> InterconnectResult<()> {
        self.get_mut(id)?.color = color.into();
        Ok(())
    }

    /// Removes a connection, returning it.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection does not exist.
    pub fn delete(&mut self, id: &str) -> InterconnectResult<UserConnection> {
        let index = self
            .connections
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| InterconnectError::unknown_connection(id))?;
        Ok(self.connections.remove(index))
    }

    /// Appends `pin` to a connection, enforcing the editing policy.
    ///
    /// Adding an `X` pin also appends its diagonal partner. Adding a pin the
    /// connection already lists is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or pin is unknown, the pin (or its
    /// partner) belongs to another connection, or the policy rejects it.
    pub fn add_pin(
        &mut self,
        id: &str,
        pin: &str,
        catalogue: &OuterPinCatalogue,
        pairs: &DiagonalPairs,
    ) -> InterconnectResult<()> {
        let net = catalogue
            .get(pin)
            .ok_or_else(|| InterconnectError::unknown_pin(id, pin))?;
        let connection = self
            .get(id)
            .ok_or_else(|| InterconnectError::unknown_connection(id))?;
        if connection.contains(pin) {
            return Ok(());
        }

        let partner = match net.kind {
            PinKind::X => pairs.partner(pin),
            _ => None,
        };

        for candidate in std::iter::once(pin).chain(partner) {
            if let Some(owner) = self.owner_of(candidate) {
                if owner.id != id {
                    return Err(InterconnectError::PinAlreadyConnected {
                        connection_id: owner.id.clone(),
                        pin: candidate.to_string(),
                    });
                }
            }
        }

        let existing_kinds: Vec<PinKind> = connection
            .outer_pin_names
            .iter()
            .filter_map(|name| catalogue.get(name).map(|n| n.kind))
            .collect();

        if existing_kinds.iter().any(|&kind| kind != net.kind) {
            return Err(InterconnectError::MixedPinKinds {
                connection_id: id.to_string(),
                pin: pin.to_string(),
            });
        }

        // An X connection only ever holds the pin and its partner.
        if net.kind == PinKind::X && !existing_kinds.is_empty() {
            let is_partner = partner.is_some_and(|p| connection.contains(p));
            if !is_partner {
                return Err(InterconnectError::MultipleDiagonalPairs {
                    connection_id: id.to_string(),
                    pin: pin.to_string(),
                });
            }
        }

        let connection = self.get_mut(id)?;
        connection.outer_pin_names.push(pin.to_string());
        if let Some(partner) = partner {
            if !connection.contains(partner) {
                tracing::debug!(pin = %pin, partner = %partner, "Added diagonal partner");
                connection.outer_pin_names.push(partner.to_string());
            }
        }
        Ok(())
    }

    /// Removes `pin` from a connection. Removing an `X` pin removes its
    /// partner too.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection does not exist.
    pub fn remove_pin(
        &mut self,
        id: &str,
        pin: &str,
        pairs: &DiagonalPairs,
    ) -> InterconnectResult<()> {
        let partner = pairs.partner(pin).map(ToString::to_string);
        let connection = self.get_mut(id)?;
        connection
            .outer_pin_names
            .retain(|p| p != pin && Some(p) != partner.as_ref());
        Ok(())
    }
}

impl From<Vec<UserConnection>> for ConnectionSet {
    fn from(connections: Vec<UserConnection>) -> Self {
        Self { connections }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interconnect::chip::{Layer, PadShape, SmtPad, SourcePort};
    use crate::interconnect::netgroup::group_nets;

    fn pin(number: u32, hint: &str) -> SourcePort {
        SourcePort {
            source_port_id: format!("sp{number}"),
            name: format!("pin{number}"),
            pin_number: number,
            port_hints: vec![format!("pin{number}"), hint.to_string()],
            subcircuit_connectivity_map_key: format!("k{number}"),
            source_component_id: None,
            subcircuit_id: None,
        }
    }

    fn pad(number: u32, x: f64, y: f64) -> SmtPad {
        SmtPad {
            pcb_smtpad_id: format!("pad{number}"),
            layer: Layer::Top,
            shape: PadShape::Rect,
            width: Some(0.5),
            height: Some(0.5),
            radius: None,
            ccw_rotation: None,
            x,
            y,
            port_hints: vec![format!("pin{number}")],
        }
    }

    fn fixture() -> (ChipModel, OuterPinCatalogue, DiagonalPairs) {
        let chip = ChipModel {
            pins: vec![
                pin(1, "C1"),
                pin(2, "C3"),
                pin(3, "X1"),
                pin(4, "X9"),
                pin(5, "X2"),
                pin(6, "X10"),
            ],
            nets: Vec::new(),
            traces: Vec::new(),
            pads: vec![
                pad(1, -4.5, 0.0),
                pad(2, 4.5, 0.0),
                pad(3, -4.5, 4.5),
                pad(4, 4.5, -4.5),
                pad(5, 4.5, 4.5),
                pad(6, -4.5, -4.5),
            ],
        };
        let catalogue = OuterPinCatalogue::extract(&group_nets(&chip.pins, &chip.nets));
        let pairs = DiagonalPairs::by_reflection(&chip, &catalogue, 0.1);
        (chip, catalogue, pairs)
    }

    #[test]
    fn reflection_pairs() {
        let (_, _, pairs) = fixture();
        assert_eq!(pairs.partner("X1"), Some("X9"));
        assert_eq!(pairs.partner("X9"), Some("X1"));
        assert_eq!(pairs.partner("X2"), Some("X10"));
        assert_eq!(pairs.partner("C1"), None);
    }

    #[test]
    fn reflection_prefers_closest_mirror() {
        // On a 1mm grid X4 sits within tolerance of X1's mirror point too.
        let chip = ChipModel {
            pins: vec![pin(1, "X1"), pin(2, "X2"), pin(3, "X4"), pin(4, "X3")],
            nets: Vec::new(),
            traces: Vec::new(),
            pads: vec![
                pad(1, -4.5, 4.5),
                pad(2, -3.5, 4.5),
                pad(3, 3.5, -4.5),
                pad(4, 4.5, -4.5),
            ],
        };
        let catalogue = OuterPinCatalogue::extract(&group_nets(&chip.pins, &chip.nets));
        let pairs = DiagonalPairs::by_reflection(&chip, &catalogue, 1.5);

        assert_eq!(pairs.partner("X1"), Some("X3"));
        assert_eq!(pairs.partner("X3"), Some("X1"));
        assert_eq!(pairs.partner("X2"), Some("X4"));
        assert_eq!(pairs.partner("X4"), Some("X2"));
    }

    #[test]
    fn reflection_drops_one_sided_matches() {
        // X1's nearest mirror is X2, but X2's nearest mirror is X3.
        let chip = ChipModel {
            pins: vec![pin(1, "X1"), pin(2, "X2"), pin(3, "X3")],
            nets: Vec::new(),
            traces: Vec::new(),
            pads: vec![pad(1, -4.0, 4.5), pad(2, 4.5, -4.5), pad(3, -4.5, 4.5)],
        };
        let catalogue = OuterPinCatalogue::extract(&group_nets(&chip.pins, &chip.nets));
        let pairs = DiagonalPairs::by_reflection(&chip, &catalogue, 1.5);

        assert_eq!(pairs.partner("X1"), None);
        assert_eq!(pairs.partner("X2"), Some("X3"));
        assert_eq!(pairs.partner("X3"), Some("X2"));
    }

    #[test]
    fn explicit_pairs() {
        let pairs = DiagonalPairs::from_pairs(&[["X1", "X9"]]);
        assert_eq!(pairs.partner("X9"), Some("X1"));
    }

    #[test]
    fn create_assigns_palette_colour() {
        let mut set = ConnectionSet::new();
        let first = set.create("a", "NET1", None).unwrap().color.clone();
        let second = set.create("b", "NET2", None).unwrap().color.clone();
        assert_eq!(first, PALETTE[0]);
        assert_eq!(second, PALETTE[1]);
        assert!(set.create("a", "again", None).is_err());
    }

    #[test]
    fn adding_x_pin_brings_partner() {
        let (_, catalogue, pairs) = fixture();
        let mut set = ConnectionSet::new();
        set.create("a", "DIAG", None).unwrap();
        set.add_pin("a", "X1", &catalogue, &pairs).unwrap();
        assert_eq!(set.get("a").unwrap().outer_pin_names, ["X1", "X9"]);

        // Adding the partner again changes nothing.
        set.add_pin("a", "X9", &catalogue, &pairs).unwrap();
        assert_eq!(set.get("a").unwrap().outer_pin_names.len(), 2);
    }

    #[test]
    fn mixing_kinds_rejected() {
        let (_, catalogue, pairs) = fixture();
        let mut set = ConnectionSet::new();
        set.create("a", "NET1", None).unwrap();
        set.add_pin("a", "C1", &catalogue, &pairs).unwrap();
        let err = set.add_pin("a", "X1", &catalogue, &pairs).unwrap_err();
        assert!(matches!(err, InterconnectError::MixedPinKinds { .. }));

        set.create("b", "DIAG", None).unwrap();
        set.add_pin("b", "X2", &catalogue, &pairs).unwrap();
        let err = set.add_pin("b", "C3", &catalogue, &pairs).unwrap_err();
        assert!(matches!(err, InterconnectError::MixedPinKinds { .. }));
    }

    #[test]
    fn second_diagonal_pair_rejected() {
        let (_, catalogue, pairs) = fixture();
        let mut set = ConnectionSet::new();
        set.create("a", "DIAG", None).unwrap();
        set.add_pin("a", "X1", &catalogue, &pairs).unwrap();
        let err = set.add_pin("a", "X2", &catalogue, &pairs).unwrap_err();
        assert!(matches!(err, InterconnectError::MultipleDiagonalPairs { .. }));
        assert_eq!(set.get("a").unwrap().outer_pin_names, ["X1", "X9"]);
    }

    #[test]
    fn pin_in_two_connections_rejected() {
        let (_, catalogue, pairs) = fixture();
        let mut set = ConnectionSet::new();
        set.create("a", "NET1", None).unwrap();
        set.create("b", "NET2", None).unwrap();
        set.add_pin("a", "C1", &catalogue, &pairs).unwrap();
        let err = set.add_pin("b", "C1", &catalogue, &pairs).unwrap_err();
        assert!(matches!(
            err,
            InterconnectError::PinAlreadyConnected { ref connection_id, .. } if connection_id == "a"
        ));
    }

    #[test]
    fn unknown_pin_and_connection() {
        let (_, catalogue, pairs) = fixture();
        let mut set = ConnectionSet::new();
        set.create("a", "NET1", None).unwrap();
        assert!(matches!(
            set.add_pin("a", "C42", &catalogue, &pairs),
            Err(InterconnectError::UnknownPin { .. })
        ));
        assert!(matches!(
            set.add_pin("zzz", "C1", &catalogue, &pairs),
            Err(InterconnectError::UnknownConnection { .. })
        ));
    }

    #[test]
    fn remove_x_pin_removes_partner() {
        let (_, catalogue, pairs) = fixture();
        let mut set = ConnectionSet::new();
        set.create("a", "DIAG", None).unwrap();
        set.add_pin("a", "X1", &catalogue, &pairs).unwrap();
        set.remove_pin("a", "X9", &pairs).unwrap();
        assert!(set.get("a").unwrap().outer_pin_names.is_empty());
    }

    #[test]
    fn rename_recolour_delete() {
        let mut set = ConnectionSet::new();
        set.create("a", "NET1", None).unwrap();
        set.rename("a", "VCC").unwrap();
        set.set_color("a", "#000000").unwrap();
        assert_eq!(set.get("a").unwrap().name, "VCC");
        assert_eq!(set.get("a").unwrap().color, "#000000");
        assert_eq!(set.delete("a").unwrap().id, "a");
        assert!(set.is_empty());
        assert!(set.delete("a").is_err());
    }

    #[test]
    fn user_connection_wire_format() {
        let json = r##"{"id":"c1","name":"NET1","outerPinNames":["C1","C3"],"color":"#fff"}"##;
        let connection: UserConnection = serde_json::from_str(json).unwrap();
        assert_eq!(connection.outer_pin_names, ["C1", "C3"]);
        assert_eq!(serde_json::to_string(&connection).unwrap(), json);
    }
}
