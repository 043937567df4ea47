//! Adjacency bridge search.
//!
//! Two outer-pin nets can be joined with a single short trace when one pad
//! of the first net sits right next to a pad of the second. A user
//! connection's `C` pins are chained this way in the order the user listed
//! them, one hop per consecutive pair.

use serde::Serialize;

use crate::interconnect::chip::{ChipModel, SmtPad};
use crate::interconnect::netgroup::{OuterPinCatalogue, OuterPinNet, PinKind};

/// Geometric limits for two pads to count as adjacent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjacencyRules {
    /// Maximum centre distance on each axis (mm).
    pub tolerance: f64,
    /// Centres closer than this on both axes are the same point (mm).
    pub epsilon: f64,
}

impl Default for AdjacencyRules {
    fn default() -> Self {
        Self {
            tolerance: 1.5,
            epsilon: 0.01,
        }
    }
}

impl AdjacencyRules {
    /// Returns `true` if the two pads are adjacent but not coincident.
    #[must_use]
    pub fn adjacent(&self, a: &SmtPad, b: &SmtPad) -> bool {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        dx <= self.tolerance && dy <= self.tolerance && (dx > self.epsilon || dy > self.epsilon)
    }
}

/// A pair of physically adjacent pads joining two nets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bridge<'a> {
    /// Pad belonging to the first net.
    pub from: &'a SmtPad,
    /// Pad belonging to the second net.
    pub to: &'a SmtPad,
}

/// A bridge found between two consecutive pins of a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainLink<'a> {
    /// Display name of the earlier pin.
    pub from_pin: String,
    /// Display name of the later pin.
    pub to_pin: String,
    /// The adjacent pads.
    pub bridge: Bridge<'a>,
}

/// Finds bridges between outer-pin nets on one chip.
#[derive(Debug, Clone, Copy)]
pub struct BridgeFinder<'a> {
    chip: &'a ChipModel,
    rules: AdjacencyRules,
}

impl<'a> BridgeFinder<'a> {
    /// Creates a finder over the pads of `chip`.
    #[must_use]
    pub const fn new(chip: &'a ChipModel, rules: AdjacencyRules) -> Self {
        Self { chip, rules }
    }

    /// Returns the first adjacent pad pair between the two nets.
    ///
    /// Pads are tried in stored order, `a`'s pads in the outer loop. This
    /// is the first pair found, not necessarily the closest.
    #[must_use]
    pub fn find(&self, a: &OuterPinNet, b: &OuterPinNet) -> Option<Bridge<'a>> {
        let a_hints = a.hints();
        let b_hints = b.hints();
        let b_pads = self.chip.pads_matching(&b_hints);

        for from in self.chip.pads_matching(&a_hints) {
            if let Some(to) = b_pads.iter().copied().find(|to| self.rules.adjacent(from, to)) {
                return Some(Bridge { from, to });
            }
        }
        None
    }

    /// Bridges consecutive `C` pins of a user-ordered chain.
    ///
    /// `X` pins and names missing from the catalogue are skipped; only
    /// neighbours in the remaining order are tried, never all pairs. A pin
    /// listed twice in a row is never bridged to itself.
    #[must_use]
    pub fn chain(&self, catalogue: &OuterPinCatalogue, names: &[String]) -> Vec<ChainLink<'a>> {
        let c_pins: Vec<&OuterPinNet> = names
            .iter()
            .filter_map(|name| catalogue.get(name))
            .filter(|net| net.kind == PinKind::C)
            .collect();

        c_pins
            .windows(2)
            .filter(|pair| pair[0].key != pair[1].key)
            .filter_map(|pair| {
                let link = self.find(pair[0], pair[1]).map(|bridge| ChainLink {
                    from_pin: pair[0].display_name.clone(),
                    to_pin: pair[1].display_name.clone(),
                    bridge,
                });
                if link.is_none() {
                    tracing::debug!(
                        from = %pair[0].display_name,
                        to = %pair[1].display_name,
                        "No adjacent pads between nets"
                    );
                }
                link
            })
            .collect()
    }
}
