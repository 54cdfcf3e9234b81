//! Structural change observers.
//!
//! Observers are registered on a single node and learn about:
//!
//! - children being added to or removed from that node **or any of its
//!   descendants** (relayed upward by internal forwarders), and
//! - the node's **own** parent changing. Parent changes of descendants are
//!   never relayed.
//!
//! # Callback Arguments
//!
//! `event_source` is always the node the observer is registered on.
//! `changed_node` is the node whose direct child set actually changed, which
//! is a descendant of `event_source` when the event was relayed.
//!
//! # Re-entrancy
//!
//! Callbacks run synchronously on the mutating thread after the structural
//! change is complete. Observers only receive IDs; they cannot reach back
//! into the hierarchy that notifies them. Mutating the tree from a callback
//! (for example through a [`SharedHierarchy`](crate::SharedHierarchy)
//! captured by the observer) is not supported and will deadlock.

use std::fmt;
use std::sync::Arc;

use slotmap::new_key_type;

use crate::node::{ChildSet, NodeId};

new_key_type! {
    /// Handle for an observer registered on a node.
    ///
    /// Returned by [`Hierarchy::add_observer`](crate::Hierarchy::add_observer)
    /// and accepted by [`Hierarchy::remove_observer`](crate::Hierarchy::remove_observer).
    pub struct ObserverId;
}

/// Receives structural change notifications for one node and its subtree.
///
/// All callbacks default to doing nothing, so implementors only override the
/// events they care about.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use canopy_core::{ChildSet, Hierarchy, HierarchyObserver, NodeId};
///
/// #[derive(Default)]
/// struct CountAdds(AtomicUsize);
///
/// impl HierarchyObserver for CountAdds {
///     fn on_children_added(&self, _source: NodeId, _changed: NodeId, added: &ChildSet) {
///         self.0.fetch_add(added.len(), Ordering::SeqCst);
///     }
/// }
///
/// let mut tree = Hierarchy::new();
/// let root = tree.insert("root");
/// let counter = Arc::new(CountAdds::default());
/// tree.add_observer(root, counter.clone()).unwrap();
///
/// let a = tree.insert("a");
/// let b = tree.insert("b");
/// tree.add_children(root, [a, b]).unwrap();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 2);
/// ```
pub trait HierarchyObserver: Send + Sync {
    /// Children were attached to `changed_node`.
    fn on_children_added(&self, event_source: NodeId, changed_node: NodeId, added: &ChildSet) {
        let _ = (event_source, changed_node, added);
    }

    /// Children were detached from `changed_node`.
    fn on_children_removed(&self, event_source: NodeId, changed_node: NodeId, removed: &ChildSet) {
        let _ = (event_source, changed_node, removed);
    }

    /// The parent of `source` changed.
    fn on_parent_changed(&self, source: NodeId, new_parent: Option<NodeId>) {
        let _ = (source, new_parent);
    }
}

/// An entry in a node's observer table.
#[derive(Clone)]
pub(crate) enum ObserverSlot {
    /// Registered by external code.
    External(Arc<dyn HierarchyObserver>),
    /// Installed by the parent when the node was attached; relays child-set
    /// changes to `target`.
    Forwarder {
        /// The parent that receives relayed events.
        target: NodeId,
    },
}

impl ObserverSlot {
    pub(crate) fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    /// Whether this slot holds exactly `observer` (same allocation).
    pub(crate) fn holds(&self, observer: &Arc<dyn HierarchyObserver>) -> bool {
        match self {
            Self::External(existing) => Arc::ptr_eq(existing, observer),
            Self::Forwarder { .. } => false,
        }
    }
}

/// A registration in the hierarchy-wide observer table.
///
/// IDs are allocated from one table per hierarchy, so an `ObserverId` names
/// exactly one registration on exactly one node.
#[derive(Clone, Debug)]
pub(crate) struct ObserverEntry {
    /// The node the observer is registered on.
    pub(crate) owner: NodeId,
    pub(crate) slot: ObserverSlot,
}

impl fmt::Debug for ObserverSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External(_) => f.write_str("External(..)"),
            Self::Forwarder { target } => f.debug_struct("Forwarder").field("target", target).finish(),
        }
    }
}

/// Which child-set change an event describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildChange {
    /// Children were attached.
    Added,
    /// Children were detached.
    Removed,
}

/// Owned form of a child-set notification, as published by
/// [`HierarchySignals`](crate::HierarchySignals).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildrenChanged {
    /// The node the observer was registered on.
    pub event_source: NodeId,
    /// The node whose direct children changed.
    pub changed_node: NodeId,
    /// The children that were added or removed.
    pub children: ChildSet,
}

/// Owned form of a parent-change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentChanged {
    /// The node whose parent changed.
    pub source: NodeId,
    /// The new parent, `None` if the node became a root.
    pub new_parent: Option<NodeId>,
}
