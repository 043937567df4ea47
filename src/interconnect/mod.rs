//! Interconnect chip model and fixture generation.
//!
//! The pipeline runs in one direction:
//!
//! ```text
//! chip records -> ChipModel -> NetGroups -> OuterPinCatalogue
//!                                  |               |
//!                                  v               v
//!              UserConnections -> ConnectivityResolver -> generator
//! ```
//!
//! [`PreparedChip`] holds everything derived from the chip alone, so one
//! loaded chip can serve any number of generation calls.

pub mod bridge;
pub mod chip;
pub mod connections;
pub mod error;
pub mod generator;
pub mod netgroup;
pub mod resolver;

pub use bridge::{AdjacencyRules, Bridge, BridgeFinder, ChainLink};
pub use chip::{ChipModel, PadNormalization, SmtPad, SourceNet, SourcePort, SourceTrace};
pub use connections::{next_color, ConnectionSet, DiagonalPairs, UserConnection};
pub use error::{InterconnectError, InterconnectResult};
pub use generator::{generate, Generation, GenerationSummary, GeneratorSettings, Variant};
pub use netgroup::{group_nets, NetGroup, NetGroups, OuterPinCatalogue, OuterPinNet, PinKind};
pub use resolver::ConnectivityResolver;

/// A loaded chip with its net groups and outer-pin catalogue.
#[derive(Debug, Clone)]
pub struct PreparedChip {
    /// The loaded records.
    pub model: ChipModel,
    /// Pins grouped by native net.
    pub groups: NetGroups,
    /// Outer pins by display name.
    pub catalogue: OuterPinCatalogue,
}

impl PreparedChip {
    /// Groups nets and extracts outer pins.
    #[must_use]
    pub fn new(model: ChipModel) -> Self {
        let groups = group_nets(&model.pins, &model.nets);
        let catalogue = OuterPinCatalogue::extract(&groups);
        tracing::debug!(
            groups = groups.len(),
            outer_pins = catalogue.len(),
            "Prepared chip"
        );
        Self {
            model,
            groups,
            catalogue,
        }
    }

    /// Builds a resolver with every connection's pins merged.
    ///
    /// # Errors
    ///
    /// Returns [`InterconnectError::UnknownPin`] if a connection lists a name
    /// that is not an outer pin of this chip.
    pub fn resolver_for(
        &self,
        connections: &[UserConnection],
    ) -> InterconnectResult<ConnectivityResolver> {
        let mut resolver = ConnectivityResolver::seed(&self.groups);
        for connection in connections {
            if let Some(pin) = connection
                .outer_pin_names
                .iter()
                .find(|name| self.catalogue.get(name).is_none() || !resolver.contains(name))
            {
                return Err(InterconnectError::unknown_pin(&connection.id, pin.as_str()));
            }
            resolver.merge_group(&connection.outer_pin_names)?;
        }
        tracing::debug!(
            connections = connections.len(),
            nets = resolver.net_count(),
            "Resolved connectivity"
        );
        Ok(resolver)
    }

    /// Diagonal partners of the `X` pins.
    ///
    /// Explicit pairs win; with none given, partners are found by mirroring
    /// each `X` pad through the chip centre.
    #[must_use]
    pub fn diagonal_pairs(&self, explicit: &[[String; 2]], tolerance: f64) -> DiagonalPairs {
        if explicit.is_empty() {
            DiagonalPairs::by_reflection(&self.model, &self.catalogue, tolerance)
        } else {
            DiagonalPairs::from_pairs(explicit)
        }
    }
}
