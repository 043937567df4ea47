//! Connectivity resolution.
//!
//! [`ConnectivityResolver`] maps every hint of the base chip to a canonical
//! net id. It starts out with one net per [`NetGroup`](super::netgroup::NetGroup)
//! (the group's connectivity key) and folds nets together as user
//! connections join outer pins.
//!
//! Internally this is a disjoint-set forest over net ids with union by size
//! and path compression during merges. Lookups walk the forest without
//! mutating it; union by size keeps the trees shallow.

use std::collections::HashMap;

use crate::interconnect::error::{InterconnectError, InterconnectResult};
use crate::interconnect::netgroup::NetGroups;

/// Hint to canonical net id mapping with incremental merging.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityResolver {
    /// Hint to net node.
    hints: HashMap<String, usize>,
    /// Native net id of each node.
    labels: Vec<String>,
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl ConnectivityResolver {
    /// Seeds the resolver with one net per group.
    ///
    /// Every hint of every member pin resolves to the group's connectivity
    /// key until merged. A hint shared by two groups stays with the first.
    #[must_use]
    pub fn seed(groups: &NetGroups) -> Self {
        let mut resolver = Self::default();

        for group in groups.values() {
            let node = resolver.push_node(&group.key);
            for hint in group.pins.iter().flat_map(|pin| &pin.port_hints) {
                if let Some(&existing) = resolver.hints.get(hint) {
                    if existing != node {
                        tracing::warn!(
                            hint = %hint,
                            kept = %resolver.labels[existing],
                            ignored = %group.key,
                            "Hint appears in more than one net group"
                        );
                    }
                    continue;
                }
                resolver.hints.insert(hint.clone(), node);
            }
        }

        tracing::debug!(
            nets = resolver.labels.len(),
            hints = resolver.hints.len(),
            "Seeded connectivity resolver"
        );
        resolver
    }

    fn push_node(&mut self, label: &str) -> usize {
        let node = self.labels.len();
        self.labels.push(label.to_string());
        self.parent.push(node);
        self.size.push(1);
        node
    }

    fn node(&self, hint: &str) -> InterconnectResult<usize> {
        self.hints
            .get(hint)
            .copied()
            .ok_or_else(|| InterconnectError::unresolved_hint(hint))
    }

    fn root(&self, mut node: usize) -> usize {
        while self.parent[node] != node {
            node = self.parent[node];
        }
        node
    }

    fn root_compress(&mut self, node: usize) -> usize {
        let root = self.root(node);
        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.root_compress(a);
        let rb = self.root_compress(b);
        if ra == rb {
            return ra;
        }
        // Larger tree wins; on a tie the earlier-seeded net keeps its id.
        let (keep, fold) = match self.size[ra].cmp(&self.size[rb]) {
            std::cmp::Ordering::Greater => (ra, rb),
            std::cmp::Ordering::Less => (rb, ra),
            std::cmp::Ordering::Equal => (ra.min(rb), ra.max(rb)),
        };
        self.parent[fold] = keep;
        self.size[keep] += self.size[fold];
        tracing::trace!(
            kept = %self.labels[keep],
            folded = %self.labels[fold],
            "Merged nets"
        );
        keep
    }

    /// Merges the nets of each inner hint list into one.
    ///
    /// Lists with fewer than two hints are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`InterconnectError::UnresolvedHint`] if any hint was never
    /// seeded. Lists before the failing one stay merged.
    pub fn merge<S: AsRef<str>>(&mut self, hint_groups: &[Vec<S>]) -> InterconnectResult<()> {
        for hints in hint_groups {
            self.merge_group(hints)?;
        }
        Ok(())
    }

    /// Merges the nets of all `hints` into one.
    ///
    /// # Errors
    ///
    /// Returns [`InterconnectError::UnresolvedHint`] if any hint was never
    /// seeded; nothing is merged in that case.
    pub fn merge_group<S: AsRef<str>>(&mut self, hints: &[S]) -> InterconnectResult<()> {
        if hints.len() < 2 {
            return Ok(());
        }
        let nodes = hints
            .iter()
            .map(|hint| self.node(hint.as_ref()))
            .collect::<InterconnectResult<Vec<_>>>()?;

        let first = nodes[0];
        for &node in &nodes[1..] {
            self.union(first, node);
        }
        Ok(())
    }

    /// Returns the canonical net id of `hint`.
    ///
    /// # Errors
    ///
    /// Returns [`InterconnectError::UnresolvedHint`] if the hint was never
    /// seeded or registered.
    pub fn resolve(&self, hint: &str) -> InterconnectResult<&str> {
        let node = self.node(hint)?;
        Ok(&self.labels[self.root(node)])
    }

    /// Resolves the first of `hints` known to the resolver.
    #[must_use]
    pub fn resolve_any<S: AsRef<str>>(&self, hints: &[S]) -> Option<&str> {
        hints.iter().find_map(|hint| self.resolve(hint.as_ref()).ok())
    }

    /// Returns `true` if `hint` was seeded or registered.
    #[must_use]
    pub fn contains(&self, hint: &str) -> bool {
        self.hints.contains_key(hint)
    }

    /// Returns `true` if both hints resolve to the same net.
    ///
    /// # Errors
    ///
    /// Returns an error if either hint is unknown.
    pub fn same_net(&self, a: &str, b: &str) -> InterconnectResult<bool> {
        Ok(self.root(self.node(a)?) == self.root(self.node(b)?))
    }

    /// Registers `hint` as a member of the net `existing` belongs to.
    ///
    /// Used for hints discovered after seeding. Registering a hint that is
    /// already known merges the two nets instead.
    ///
    /// # Errors
    ///
    /// Returns [`InterconnectError::UnresolvedHint`] if `existing` is unknown.
    pub fn register(&mut self, hint: &str, existing: &str) -> InterconnectResult<()> {
        let node = self.node(existing)?;
        match self.hints.get(hint).copied() {
            Some(known) => {
                self.union(known, node);
            }
            None => {
                self.hints.insert(hint.to_string(), node);
            }
        }
        Ok(())
    }

    /// Number of distinct canonical nets.
    #[must_use]
    pub fn net_count(&self) -> usize {
        (0..self.parent.len())
            .filter(|&node| self.parent[node] == node)
            .count()
    }
}
