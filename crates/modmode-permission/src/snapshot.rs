//! Reversible permission mutation around a mode transition.

use std::collections::BTreeSet;

use modmode_data::StoredNode;
use tracing::warn;
use uuid::Uuid;

use crate::{Node, PermissionBackend, PermissionError, Propagation};

/// The nodes a player held when entering a mode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionSnapshot {
    nodes: BTreeSet<Node>,
}

impl PermissionSnapshot {
    #[must_use]
    pub const fn new(nodes: BTreeSet<Node>) -> Self {
        Self { nodes }
    }

    #[must_use]
    pub const fn nodes(&self) -> &BTreeSet<Node> {
        &self.nodes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn to_stored(&self) -> Vec<StoredNode> {
        self.nodes.iter().map(StoredNode::from).collect()
    }
}

impl FromIterator<Node> for PermissionSnapshot {
    fn from_iter<T: IntoIterator<Item = Node>>(iter: T) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<StoredNode>> for PermissionSnapshot {
    fn from(stored: Vec<StoredNode>) -> Self {
        stored.into_iter().map(Node::from).collect()
    }
}

/// What happened while replaying a [`PermissionSnapshot`].
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<Node>,
    pub skipped: Vec<(Node, PermissionError)>,
    pub propagation: Propagation,
}

/// Captures, strips and restores non-persistent nodes through a [`PermissionBackend`].
pub struct PermissionSnapshotStore<'a, B: PermissionBackend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: PermissionBackend + ?Sized> PermissionSnapshotStore<'a, B> {
    pub const fn new(backend: &'a mut B) -> Self {
        Self { backend }
    }

    /// Reads the nodes currently applied to `player`, leaving out every node whose name is in
    /// `excluded`.
    #[must_use]
    pub fn capture(&self, player: Uuid, excluded: &BTreeSet<String>) -> PermissionSnapshot {
        self.backend
            .list_nodes(player)
            .into_iter()
            .filter(|node| !excluded.contains(&node.name))
            .collect()
    }

    /// Removes every node of `snapshot` from `player`. Failures are logged and skipped.
    pub fn strip(&mut self, player: Uuid, snapshot: &PermissionSnapshot) -> Propagation {
        let mut propagation = Propagation::Applied;
        for node in snapshot.iter() {
            match self.backend.remove_node(player, node) {
                Ok(outcome) => propagation = propagation.and(outcome),
                Err(e) => warn!("failed to strip {node} from {player}: {e}"),
            }
        }
        propagation
    }

    /// Re-applies every node of `snapshot` to `player` in its original scope.
    ///
    /// Restoring is best effort: a node that cannot be applied is reported in
    /// [`RestoreReport::skipped`] and the rest are still restored.
    pub fn restore(&mut self, player: Uuid, snapshot: &PermissionSnapshot) -> RestoreReport {
        let mut report = RestoreReport::default();
        for node in snapshot.iter() {
            match self.backend.add_node(player, node) {
                Ok(outcome) => {
                    report.propagation = report.propagation.and(outcome);
                    report.restored.push(node.clone());
                }
                Err(e) => {
                    warn!("skipping {node} while restoring permissions of {player}: {e}");
                    report.skipped.push((node.clone(), e));
                }
            }
        }
        report
    }
}
