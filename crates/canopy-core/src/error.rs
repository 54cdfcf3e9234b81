//! Error types for Canopy.

use crate::node::NodeId;

/// A specialized Result type for hierarchy operations.
pub type Result<T> = std::result::Result<T, HierarchyError>;

/// Errors that can occur while mutating or querying a hierarchy.
///
/// Idempotent operations (re-adding a present child, removing an absent one,
/// assigning the current parent again) are not errors; they return `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// The node ID does not refer to a live node of this hierarchy.
    #[error("node {0:?} is not part of this hierarchy")]
    UnknownNode(NodeId),

    /// A node was asked to become its own parent.
    #[error("node {0:?} cannot be parent to itself")]
    SelfParent(NodeId),

    /// The requested parent lies inside the subtree of the node.
    #[error("cannot make {parent:?} the parent of {node:?}: it is a descendant of {node:?}")]
    CircularParentage {
        /// The node being attached.
        node: NodeId,
        /// The parent that would close a cycle.
        parent: NodeId,
    },
}

impl HierarchyError {
    /// Whether the error was caused by an argument that does not resolve to a node.
    pub fn is_unknown_node(&self) -> bool {
        matches!(self, Self::UnknownNode(_))
    }

    /// Whether the error was caused by an argument that would break the tree shape.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::SelfParent(_) | Self::CircularParentage { .. })
    }
}
