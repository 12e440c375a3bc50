use std::fmt;

use modmode_data::StoredNode;

/// Where a [`Node`] applies.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Scope {
    /// Applies in every partition of the environment and is removed from every partition.
    #[default]
    Global,
    /// Bound to a single partition, e.g. one world.
    Partition(String),
}

/// An atomic permission grant. Two nodes are equal only if both name and scope match.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Node {
    pub name: String,
    pub scope: Scope,
}

impl Node {
    #[must_use]
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Global,
        }
    }

    #[must_use]
    pub fn scoped(name: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Partition(partition.into()),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Global => f.write_str(&self.name),
            Scope::Partition(partition) => write!(f, "{}@{partition}", self.name),
        }
    }
}

impl From<&Node> for StoredNode {
    fn from(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            scope: match &node.scope {
                Scope::Global => None,
                Scope::Partition(partition) => Some(partition.clone()),
            },
        }
    }
}

impl From<StoredNode> for Node {
    fn from(stored: StoredNode) -> Self {
        Self {
            name: stored.name,
            scope: stored.scope.map_or(Scope::Global, Scope::Partition),
        }
    }
}
