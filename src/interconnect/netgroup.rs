//! Net grouping and outer-pin extraction.
//!
//! Pins and declared nets are partitioned by their native connectivity key
//! into [`NetGroup`]s. Each group that contains an outer pin (one carrying a
//! `C<n>` or `X<n>` hint) becomes an [`OuterPinNet`], named by that hint.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::interconnect::chip::{SourceNet, SourcePort};

/// Matches freely configurable outer pins (`C1`, `C18`, ...).
static C_PIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^C\d+$").unwrap());

/// Matches diagonally paired outer pins (`X1`, `X18`, ...).
static X_PIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^X\d+$").unwrap());

/// Role of a chip pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinKind {
    /// Freely configurable outer pin.
    C,
    /// Outer pin with a fixed diagonal partner.
    X,
    /// Internal matrix pin.
    #[serde(rename = "IN")]
    Inner,
}

impl PinKind {
    /// Classifies a single hint. Returns `None` for hints that name no role.
    #[must_use]
    pub fn of_hint(hint: &str) -> Option<Self> {
        if C_PIN.is_match(hint) {
            Some(Self::C)
        } else if X_PIN.is_match(hint) {
            Some(Self::X)
        } else {
            None
        }
    }

    /// Classifies a pin, returning its kind and the hint that decided it.
    #[must_use]
    pub fn of_pin(pin: &SourcePort) -> (Self, Option<&str>) {
        pin.port_hints
            .iter()
            .find_map(|hint| Self::of_hint(hint).map(|kind| (kind, Some(hint.as_str()))))
            .unwrap_or((Self::Inner, None))
    }

    /// Returns `true` for `C` and `X`.
    #[must_use]
    pub const fn is_outer(self) -> bool {
        matches!(self, Self::C | Self::X)
    }
}

impl fmt::Display for PinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::C => write!(f, "C"),
            Self::X => write!(f, "X"),
            Self::Inner => write!(f, "IN"),
        }
    }
}

/// Pins and the declared net sharing one connectivity key.
#[derive(Debug, Clone, PartialEq)]
pub struct NetGroup {
    /// The shared connectivity key.
    pub key: String,
    /// Member pins in declaration order.
    pub pins: Vec<SourcePort>,
    /// The declared net for this key, if any.
    pub net: Option<SourceNet>,
}

impl NetGroup {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            pins: Vec::new(),
            net: None,
        }
    }
}

/// Net groups keyed by connectivity key, in first-seen order.
pub type NetGroups = IndexMap<String, NetGroup>;

/// Partitions pins and declared nets by connectivity key.
///
/// Groups with pins but no net, or a net but no pins, are kept.
#[must_use]
pub fn group_nets(pins: &[SourcePort], nets: &[SourceNet]) -> NetGroups {
    let mut groups = NetGroups::new();

    for pin in pins {
        let key = &pin.subcircuit_connectivity_map_key;
        groups
            .entry(key.clone())
            .or_insert_with(|| NetGroup::new(key))
            .pins
            .push(pin.clone());
    }

    for net in nets {
        let key = &net.subcircuit_connectivity_map_key;
        let group = groups
            .entry(key.clone())
            .or_insert_with(|| NetGroup::new(key));
        if group.net.is_some() {
            tracing::warn!(key = %key, net = %net.name, "Duplicate declared net for key");
            continue;
        }
        group.net = Some(net.clone());
    }

    tracing::debug!(groups = groups.len(), "Grouped chip nets");
    groups
}

/// A net group exposed to the user through one outer pin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OuterPinNet {
    /// The outer pin's role hint, e.g. `"C3"` or `"X7"`.
    pub display_name: String,
    /// `C` or `X`.
    pub kind: PinKind,
    /// Native connectivity key of the group.
    pub key: String,
    /// Every pin of the group, inner pins included.
    pub pins: Vec<SourcePort>,
    /// Index into `pins` of the outer pin itself.
    pub outer_index: usize,
}

impl OuterPinNet {
    /// The outer pin of this net.
    #[must_use]
    pub fn outer_pin(&self) -> &SourcePort {
        &self.pins[self.outer_index]
    }

    /// All hints of all pins in the group, in pin order.
    #[must_use]
    pub fn hints(&self) -> Vec<String> {
        self.pins
            .iter()
            .flat_map(|pin| pin.port_hints.iter().cloned())
            .collect()
    }
}

/// The outer pins of a chip, indexed by display name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OuterPinCatalogue {
    nets: Vec<OuterPinNet>,
    by_name: HashMap<String, usize>,
}

impl OuterPinCatalogue {
    /// Extracts the outer pin of every group that has one.
    ///
    /// The first `C`/`X` pin in declared order wins; inner-only groups are
    /// left out.
    #[must_use]
    pub fn extract(groups: &NetGroups) -> Self {
        let mut catalogue = Self::default();

        for group in groups.values() {
            let chosen = group.pins.iter().enumerate().find_map(|(index, pin)| {
                match PinKind::of_pin(pin) {
                    (kind, Some(hint)) if kind.is_outer() => Some((index, kind, hint.to_string())),
                    _ => None,
                }
            });

            let Some((outer_index, kind, display_name)) = chosen else {
                tracing::trace!(key = %group.key, "Group has no outer pin");
                continue;
            };

            if catalogue.by_name.contains_key(&display_name) {
                tracing::warn!(name = %display_name, key = %group.key, "Duplicate outer pin name");
                continue;
            }

            catalogue
                .by_name
                .insert(display_name.clone(), catalogue.nets.len());
            catalogue.nets.push(OuterPinNet {
                display_name,
                kind,
                key: group.key.clone(),
                pins: group.pins.clone(),
                outer_index,
            });
        }

        tracing::debug!(outer_pins = catalogue.nets.len(), "Extracted outer pins");
        catalogue
    }

    /// Looks up an outer pin net by display name.
    #[must_use]
    pub fn get(&self, display_name: &str) -> Option<&OuterPinNet> {
        self.by_name.get(display_name).map(|&i| &self.nets[i])
    }

    /// Iterates outer pin nets in extraction order.
    pub fn iter(&self) -> impl Iterator<Item = &OuterPinNet> {
        self.nets.iter()
    }

    /// Number of outer pins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nets.len()
    }

    /// Returns `true` if the chip has no outer pins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}
