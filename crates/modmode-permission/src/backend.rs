use std::collections::BTreeSet;

use thiserror::Error;
use uuid::Uuid;

use crate::Node;

/// Whether a permission change has taken effect yet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Propagation {
    #[default]
    Applied,
    /// Handed to an asynchronous worker. A confirmation will be delivered later on the primary
    /// context.
    Deferred,
}

impl Propagation {
    /// Combines two outcomes; the result is deferred if either one is.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Applied, Self::Applied) => Self::Applied,
            _ => Self::Deferred,
        }
    }

    #[must_use]
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::Deferred)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("scope `{0}` no longer exists")]
    UnknownScope(String),
    #[error("node `{node}` was rejected: {reason}")]
    Rejected { node: String, reason: String },
    #[error("player {0} is unknown to the permission backend")]
    UnknownPlayer(Uuid),
}

/// The host's permission system.
pub trait PermissionBackend {
    /// The nodes currently applied to `player`.
    fn list_nodes(&self, player: Uuid) -> BTreeSet<Node>;

    fn add_node(&mut self, player: Uuid, node: &Node) -> Result<Propagation, PermissionError>;

    fn remove_node(&mut self, player: Uuid, node: &Node) -> Result<Propagation, PermissionError>;

    /// Whether `player` holds `capability` after inheritance is resolved.
    fn has_capability(&self, player: Uuid, capability: &str) -> bool;
}
