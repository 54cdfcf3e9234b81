//! Node identity and per-node storage.
//!
//! Every vertex of a [`Hierarchy`](crate::Hierarchy) is addressed by a
//! [`NodeId`]. The data behind an ID (payload, parent link, child set,
//! observer table) is private to the crate and only reachable through the
//! hierarchy, which keeps both directions of the parent/child relation in
//! sync.

use std::collections::{BTreeMap, BTreeSet};

use slotmap::new_key_type;

use crate::observer::ObserverId;

new_key_type! {
    /// A unique identifier for a node in a [`Hierarchy`](crate::Hierarchy).
    ///
    /// `NodeId`s are stable handles that remain valid while the node is moved
    /// around the forest. They become invalid when the node is removed.
    ///
    /// # Related Types
    ///
    /// - [`Hierarchy`](crate::Hierarchy) - Owns the nodes this ID refers to
    /// - [`ChildSet`] - The set of children of a node
    pub struct NodeId;
}

impl NodeId {
    /// Convert the NodeId to a raw u64 value.
    ///
    /// The raw value can be converted back using [`NodeId::from_raw`].
    #[inline]
    pub fn as_raw(self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }

    /// Create a NodeId from a raw u64 value.
    ///
    /// This does not check whether the node exists in any hierarchy.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self::from(slotmap::KeyData::from_ffi(raw))
    }
}

/// The children of a node: unique membership, no sibling ordering.
pub type ChildSet = BTreeSet<NodeId>;

/// Internal data stored in the hierarchy for each node.
pub(crate) struct NodeData<T> {
    /// User payload.
    pub(crate) payload: T,
    /// Non-owning back reference to the parent (if any).
    pub(crate) parent: Option<NodeId>,
    /// Direct children.
    pub(crate) children: ChildSet,
    /// Registrations on this node in registration order: external observers
    /// and the forwarder installed by the parent. The entries themselves live
    /// in the hierarchy-wide observer table.
    pub(crate) observers: Vec<ObserverId>,
    /// Per-edge subscription records: child -> forwarder registered on that child.
    pub(crate) forwarders: BTreeMap<NodeId, ObserverId>,
}

impl<T> NodeData<T> {
    pub(crate) fn new(payload: T) -> Self {
        Self {
            payload,
            parent: None,
            children: ChildSet::new(),
            observers: Vec::new(),
            forwarders: BTreeMap::new(),
        }
    }
}
