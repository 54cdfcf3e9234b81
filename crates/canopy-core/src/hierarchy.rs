//! The observable forest.
//!
//! [`Hierarchy`] stores any number of trees in one arena. Each node carries a
//! payload, a non-owning link to its parent, a set of children and a table of
//! observers. Every public mutation keeps the two directions of the
//! parent/child relation consistent, refuses to create cycles, and reports
//! what changed to the observers of the affected nodes and their ancestors.
//!
//! # Notification Rules
//!
//! - Attaching or detaching children notifies the observers of the parent
//!   with one batched event, and the observers of every ancestor through
//!   forwarders installed on each parent/child edge.
//! - A node whose parent changes notifies its own observers. Ancestors are
//!   not told about parent changes of their descendants.
//! - When a node moves between two parents that share an ancestor, that
//!   ancestor (and everything above it) hears nothing about the move: the
//!   node was inside its subtree before and still is. The old and new parent
//!   always see the removal and the addition.
//!
//! # Related Modules
//!
//! - [`crate::observer`] - The callback trait and event types
//! - [`crate::traversal`] - Ancestry tests used for cycle checks and muting
//! - [`crate::SharedHierarchy`] - Lock-protected wrapper for shared use

use std::collections::{BTreeMap, VecDeque};
use std::iter;
use std::sync::Arc;

use slotmap::SlotMap;

use crate::error::{HierarchyError, Result};
use crate::logging::targets;
use crate::node::{ChildSet, NodeData, NodeId};
use crate::observer::{ChildChange, HierarchyObserver, ObserverEntry, ObserverId, ObserverSlot};
use crate::transaction::{ChildEvent, Phase, Transaction};
use crate::traversal::{self, ParentLookup};

/// A forest of payload-carrying nodes with structural change notification.
///
/// # Example
///
/// ```
/// use canopy_core::Hierarchy;
///
/// let mut tree = Hierarchy::new();
/// let root = tree.insert("root");
/// let a = tree.insert("a");
/// let b = tree.insert("b");
///
/// tree.add_children(root, [a, b]).unwrap();
/// assert_eq!(tree.parent(a).unwrap(), Some(root));
///
/// // Moving `b` under `a` keeps both directions of the relation in sync.
/// tree.set_parent(b, Some(a)).unwrap();
/// assert!(tree.children(a).unwrap().contains(&b));
/// assert!(!tree.children(root).unwrap().contains(&b));
/// ```
pub struct Hierarchy<T> {
    nodes: SlotMap<NodeId, NodeData<T>>,
    /// Every observer registration of every node, external and forwarder.
    observers: SlotMap<ObserverId, ObserverEntry>,
}

impl<T> Hierarchy<T> {
    /// Create a new empty hierarchy.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            observers: SlotMap::with_key(),
        }
    }

    /// Create an empty hierarchy with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(capacity),
            observers: SlotMap::with_key(),
        }
    }

    /// Add a detached node carrying `payload` and return its ID.
    pub fn insert(&mut self, payload: T) -> NodeId {
        let id = self.nodes.insert(NodeData::new(payload));
        crate::canopy_trace!(?id, node_count = self.nodes.len(), "inserted node");
        id
    }

    /// Remove a node and return its payload.
    ///
    /// The node is detached from its parent and its children become roots;
    /// both changes are reported as usual before the node and its observers
    /// are dropped.
    #[tracing::instrument(skip(self), target = "canopy_core::hierarchy", level = "trace")]
    pub fn remove(&mut self, id: NodeId) -> Result<T> {
        if let Some(parent) = self.node(id)?.parent {
            self.remove_child(parent, id)?;
        }
        self.clear_children(id)?;
        let data = self.nodes.remove(id).ok_or_else(|| unknown_node(id))?;
        for observer in &data.observers {
            self.observers.remove(*observer);
        }
        crate::canopy_debug!(?id, node_count = self.nodes.len(), "removed node");
        Ok(data.payload)
    }

    /// Check whether a node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes across all trees.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the hierarchy has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow the payload of a node.
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id).map(|data| &data.payload)
    }

    /// Mutably borrow the payload of a node.
    ///
    /// Payload changes are not structural and are not reported to observers.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(id).map(|data| &mut data.payload)
    }

    fn node(&self, id: NodeId) -> Result<&NodeData<T>> {
        self.nodes.get(id).ok_or_else(|| unknown_node(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData<T>> {
        self.nodes.get_mut(id).ok_or_else(|| unknown_node(id))
    }

    // =========================================================================
    // Structure queries
    // =========================================================================

    /// Get the parent of a node.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.node(id).map(|data| data.parent)
    }

    /// Get the children of a node.
    pub fn children(&self, id: NodeId) -> Result<&ChildSet> {
        self.node(id).map(|data| &data.children)
    }

    /// Number of direct children of a node.
    pub fn child_count(&self, id: NodeId) -> Result<usize> {
        self.node(id).map(|data| data.children.len())
    }

    /// Whether the node has no parent.
    pub fn is_root(&self, id: NodeId) -> Result<bool> {
        self.node(id).map(|data| data.parent.is_none())
    }

    /// Iterate the roots of all trees in the forest.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, data)| data.parent.is_none())
            .map(|(id, _)| id)
    }

    /// Get all ancestors of a node from its parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.node(id)?;
        Ok(traversal::ancestors(self, id).collect())
    }

    /// Number of edges between the node and the root of its tree.
    pub fn depth(&self, id: NodeId) -> Result<usize> {
        self.node(id)?;
        Ok(traversal::ancestors(self, id).count())
    }

    /// Whether `candidate` is a strict ancestor of `node`.
    pub fn is_ancestor_of(&self, candidate: NodeId, node: NodeId) -> bool {
        traversal::is_ancestor_of(self, candidate, node)
    }

    /// Whether `node` is `root` or one of its descendants.
    pub fn subtree_contains(&self, root: NodeId, node: NodeId) -> bool {
        traversal::subtree_contains(self, root, node)
    }

    /// Depth-first pre-order traversal of the subtree rooted at `id`.
    ///
    /// Siblings are visited in `NodeId` order.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let data = self.node(current)?;
            result.push(current);
            stack.extend(data.children.iter().rev().copied());
        }
        Ok(result)
    }

    /// Breadth-first (level-order) traversal of the subtree rooted at `id`.
    pub fn breadth_first(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.node(id)?;
        let mut result = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            result.push(current);
            if let Some(data) = self.nodes.get(current) {
                queue.extend(data.children.iter().copied());
            }
        }
        Ok(result)
    }

    /// Verify that parent links and child sets agree, that every edge has
    /// exactly its forwarder, and that no cycles exist.
    pub fn is_consistent(&self) -> bool {
        let registrations: usize = self.nodes.values().map(|data| data.observers.len()).sum();
        if registrations != self.observers.len() {
            return false;
        }

        self.nodes.iter().all(|(id, data)| {
            let parent_agrees = match data.parent {
                Some(parent) => {
                    parent != id
                        && self.nodes.get(parent).is_some_and(|p| {
                            p.children.contains(&id)
                                && p.forwarders
                                    .get(&id)
                                    .is_some_and(|forwarder| data.observers.contains(forwarder))
                        })
                }
                None => true,
            };
            let observers_owned = data.observers.iter().all(|&observer| {
                self.observers
                    .get(observer)
                    .is_some_and(|entry| entry.owner == id)
            });
            let children_agree = data.children.iter().all(|&child| {
                child != id && self.nodes.get(child).is_some_and(|c| c.parent == Some(id))
            });
            // Bounded so a corrupted parent chain cannot loop forever.
            let acyclic = !traversal::ancestors(self, id)
                .take(self.nodes.len())
                .any(|ancestor| ancestor == id);
            parent_agrees && observers_owned && children_agree && acyclic
        })
    }

    // =========================================================================
    // Structural mutation
    // =========================================================================

    /// Set the parent of a node.
    ///
    /// Passing `None` makes the node a root. Returns `Ok(false)` if `new_parent`
    /// already is the parent.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::UnknownNode`] if either node does not exist
    /// - [`HierarchyError::SelfParent`] if `new_parent` is the node itself
    /// - [`HierarchyError::CircularParentage`] if `new_parent` is a descendant
    #[tracing::instrument(skip(self), target = "canopy_core::hierarchy", level = "trace")]
    pub fn set_parent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> Result<bool> {
        let current = self.node(id)?.parent;
        if new_parent == Some(id) {
            tracing::debug!(target: targets::HIERARCHY, ?id, "rejected self parent");
            return Err(HierarchyError::SelfParent(id));
        }
        if current == new_parent {
            return Ok(false);
        }
        match new_parent {
            Some(parent) => self.add_children(parent, [id]),
            None => match current {
                Some(old) => self.remove_children(old, [id]),
                None => Ok(false),
            },
        }
    }

    /// Attach `child` to `parent`.
    ///
    /// A child that currently belongs to another parent is moved. Returns
    /// `Ok(false)` without notifying anyone if `child` already is a child of
    /// `parent`.
    ///
    /// # Errors
    ///
    /// Same as [`add_children`](Self::add_children).
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.add_children(parent, [child])
    }

    /// Attach several children to `parent` at once.
    ///
    /// Only children not already attached to `parent` are added, and they are
    /// reported in a single event. Every element is validated before anything
    /// changes, so a rejected batch leaves the hierarchy untouched.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::UnknownNode`] if `parent` or any child does not exist
    /// - [`HierarchyError::SelfParent`] if the batch contains `parent`
    /// - [`HierarchyError::CircularParentage`] if the batch contains an ancestor of `parent`
    #[tracing::instrument(skip(self, children), target = "canopy_core::hierarchy", level = "trace")]
    pub fn add_children<I>(&mut self, parent: NodeId, children: I) -> Result<bool>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let requested: ChildSet = children.into_iter().collect();
        let existing = &self.node(parent)?.children;

        for &child in &requested {
            if !self.nodes.contains_key(child) {
                tracing::debug!(target: targets::HIERARCHY, ?parent, ?child, "rejected unknown child");
                return Err(HierarchyError::UnknownNode(child));
            }
            if child == parent {
                tracing::debug!(target: targets::HIERARCHY, ?parent, "rejected self parent");
                return Err(HierarchyError::SelfParent(parent));
            }
            if self.is_ancestor_of(child, parent) {
                tracing::debug!(target: targets::HIERARCHY, ?parent, ?child, "rejected circular parentage");
                return Err(HierarchyError::CircularParentage { node: child, parent });
            }
        }

        let fresh: ChildSet = requested
            .into_iter()
            .filter(|child| !existing.contains(child))
            .collect();
        if fresh.is_empty() {
            return Ok(false);
        }

        self.attach(parent, fresh);
        Ok(true)
    }

    /// Detach `child` from `parent`.
    ///
    /// Returns `Ok(false)` if `child` is not a child of `parent` (including when
    /// `child` does not exist at all).
    ///
    /// # Errors
    ///
    /// [`HierarchyError::UnknownNode`] if `parent` does not exist.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.remove_children(parent, [child])
    }

    /// Detach several children from `parent` at once.
    ///
    /// Elements that are not children of `parent` are ignored. The children
    /// actually removed are reported in a single event; nothing is reported if
    /// none were removed.
    ///
    /// # Errors
    ///
    /// [`HierarchyError::UnknownNode`] if `parent` does not exist.
    #[tracing::instrument(skip(self, children), target = "canopy_core::hierarchy", level = "trace")]
    pub fn remove_children<I>(&mut self, parent: NodeId, children: I) -> Result<bool>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let existing = &self.node(parent)?.children;
        let present: ChildSet = children
            .into_iter()
            .filter(|child| existing.contains(child))
            .collect();
        if present.is_empty() {
            return Ok(false);
        }

        self.detach(parent, present);
        Ok(true)
    }

    /// Detach all children of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if a child is still attached afterwards, which indicates a bug
    /// in the hierarchy itself.
    #[tracing::instrument(skip(self), target = "canopy_core::hierarchy", level = "trace")]
    pub fn clear_children(&mut self, parent: NodeId) -> Result<()> {
        let all = self.node(parent)?.children.clone();
        self.remove_children(parent, all)?;
        let remaining = self.node(parent)?.children.len();
        assert!(
            remaining == 0,
            "node {parent:?} still has {remaining} children after clearing"
        );
        Ok(())
    }

    /// Attach `fresh` (validated, none of them children of `parent` yet).
    fn attach(&mut self, parent: NodeId, fresh: ChildSet) {
        let mut tx = Transaction::new();

        // Capture old parents and their ancestry before anything moves.
        let mut departures: BTreeMap<NodeId, ChildSet> = BTreeMap::new();
        for &child in &fresh {
            if let Some(old) = self.nodes.get(child).and_then(|data| data.parent) {
                let from_chain: Vec<NodeId> = iter::once(old)
                    .chain(traversal::ancestors(&*self, old))
                    .collect();
                tx.record_move(child, parent, from_chain);
                departures.entry(old).or_default().insert(child);
            }
        }

        tx.enter(Phase::Detaching);
        for (old, leaving) in departures {
            for &child in &leaving {
                self.unlink(old, child);
            }
            tx.record_removed(old, leaving);
        }

        tx.enter(Phase::Attaching);
        for &child in &fresh {
            self.link(parent, child);
            tx.record_parent_change(child, Some(parent));
        }
        tracing::trace!(target: targets::HIERARCHY, ?parent, children = ?fresh, "attached children");
        tx.record_added(parent, fresh);

        self.commit(tx);
    }

    /// Detach `present` (all of them children of `parent`).
    fn detach(&mut self, parent: NodeId, present: ChildSet) {
        let mut tx = Transaction::new();

        tx.enter(Phase::Detaching);
        for &child in &present {
            self.unlink(parent, child);
            tx.record_parent_change(child, None);
        }
        tracing::trace!(target: targets::HIERARCHY, ?parent, children = ?present, "detached children");
        tx.record_removed(parent, present);

        self.commit(tx);
    }

    /// Create the edge `parent -> child` together with its forwarder.
    fn link(&mut self, parent: NodeId, child: NodeId) {
        let Some(child_data) = self.nodes.get_mut(child) else {
            return;
        };
        let forwarder = self.observers.insert(ObserverEntry {
            owner: child,
            slot: ObserverSlot::Forwarder { target: parent },
        });
        child_data.parent = Some(parent);
        child_data.observers.push(forwarder);

        if let Some(parent_data) = self.nodes.get_mut(parent) {
            parent_data.children.insert(child);
            parent_data.forwarders.insert(child, forwarder);
        }
    }

    /// Remove the edge `parent -> child` together with its forwarder.
    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        let mut forwarder = None;
        if let Some(parent_data) = self.nodes.get_mut(parent) {
            parent_data.children.remove(&child);
            forwarder = parent_data.forwarders.remove(&child);
        }

        if let Some(child_data) = self.nodes.get_mut(child) {
            child_data.parent = None;
            if let Some(forwarder) = forwarder {
                child_data.observers.retain(|&observer| observer != forwarder);
            }
        }
        if let Some(forwarder) = forwarder {
            self.observers.remove(forwarder);
        }
    }

    // =========================================================================
    // Notification
    // =========================================================================

    /// Register an observer on a node.
    ///
    /// The observer sees child-set changes of the node and of every node
    /// below it, and parent changes of the node itself. The observers of a
    /// node form a set: registering the same `Arc` on the same node again
    /// returns the existing ID and does not duplicate notifications.
    pub fn add_observer(
        &mut self,
        id: NodeId,
        observer: Arc<dyn HierarchyObserver>,
    ) -> Result<ObserverId> {
        let existing = self.node(id)?.observers.iter().copied().find(|&registered| {
            self.observers
                .get(registered)
                .is_some_and(|entry| entry.slot.holds(&observer))
        });
        if let Some(observer_id) = existing {
            tracing::trace!(target: targets::NOTIFY, node = ?id, observer = ?observer_id, "observer already registered");
            return Ok(observer_id);
        }

        let observer_id = self.observers.insert(ObserverEntry {
            owner: id,
            slot: ObserverSlot::External(observer),
        });
        self.node_mut(id)?.observers.push(observer_id);
        tracing::trace!(target: targets::NOTIFY, node = ?id, observer = ?observer_id, "observer added");
        Ok(observer_id)
    }

    /// Unregister an observer from a node.
    ///
    /// Returns `Ok(false)` if `observer` is not an observer registered on this
    /// node, including IDs obtained from another node.
    pub fn remove_observer(&mut self, id: NodeId, observer: ObserverId) -> Result<bool> {
        self.node(id)?;
        let registered = self
            .observers
            .get(observer)
            .is_some_and(|entry| entry.owner == id && entry.slot.is_external());
        if registered {
            self.observers.remove(observer);
            self.node_mut(id)?.observers.retain(|&other| other != observer);
        }
        tracing::trace!(target: targets::NOTIFY, node = ?id, ?observer, removed = registered, "observer removed");
        Ok(registered)
    }

    /// Number of observers registered on a node by external code.
    pub fn observer_count(&self, id: NodeId) -> Result<usize> {
        let count = self
            .node(id)?
            .observers
            .iter()
            .filter(|&&observer| {
                self.observers
                    .get(observer)
                    .is_some_and(|entry| entry.slot.is_external())
            })
            .count();
        Ok(count)
    }

    /// Deliver everything the transaction collected, then close it.
    fn commit(&self, mut tx: Transaction) {
        tx.enter(Phase::Notifying);
        if tx.is_empty() {
            tx.finish();
            return;
        }
        for (node, record) in tx.moves() {
            tracing::trace!(target: targets::HIERARCHY, ?node, from = ?record.from(), to = ?record.to, "moved node");
        }

        let (removed, added, parent_changes) = tx.drain();
        for event in &removed {
            self.emit_child_event(&tx, ChildChange::Removed, event);
        }
        if let Some(event) = &added {
            self.emit_child_event(&tx, ChildChange::Added, event);
        }
        for (node, new_parent) in parent_changes {
            self.emit_parent_changed(node, new_parent);
        }

        tx.finish();
    }

    /// Notify the observers of the changed node, then walk up the forwarder
    /// chain notifying each ancestor with the children still visible to it.
    fn emit_child_event(&self, tx: &Transaction, change: ChildChange, event: &ChildEvent) {
        let changed_node = event.changed_node;
        let mut owner = changed_node;
        let mut visible = event.children.clone();

        loop {
            let Some(data) = self.nodes.get(owner) else {
                return;
            };
            tracing::trace!(
                target: targets::NOTIFY,
                ?owner,
                ?changed_node,
                ?change,
                observer_count = data.observers.len(),
                "delivering child event"
            );

            let mut forward_to = None;
            for entry in data.observers.iter().filter_map(|&id| self.observers.get(id)) {
                match &entry.slot {
                    ObserverSlot::External(observer) => match change {
                        ChildChange::Added => observer.on_children_added(owner, changed_node, &visible),
                        ChildChange::Removed => {
                            observer.on_children_removed(owner, changed_node, &visible)
                        }
                    },
                    ObserverSlot::Forwarder { target } => forward_to = Some(*target),
                }
            }

            let Some(target) = forward_to else {
                return;
            };
            let forwarded = tx.visible_to(self, target, &visible);
            if forwarded.len() < visible.len() {
                let muted: ChildSet = visible.difference(&forwarded).copied().collect();
                tracing::trace!(
                    target: targets::NOTIFY,
                    ancestor = ?target,
                    ?muted,
                    "muted move inside subtree"
                );
            }
            if forwarded.is_empty() {
                return;
            }
            owner = target;
            visible = forwarded;
        }
    }

    fn emit_parent_changed(&self, node: NodeId, new_parent: Option<NodeId>) {
        let Some(data) = self.nodes.get(node) else {
            return;
        };
        tracing::trace!(target: targets::NOTIFY, ?node, ?new_parent, "delivering parent change");
        for entry in data.observers.iter().filter_map(|&id| self.observers.get(id)) {
            if let ObserverSlot::External(observer) = &entry.slot {
                observer.on_parent_changed(node, new_parent);
            }
        }
    }
}

fn unknown_node(id: NodeId) -> HierarchyError {
    tracing::debug!(target: targets::HIERARCHY, ?id, "unknown node");
    HierarchyError::UnknownNode(id)
}

impl<T> Default for Hierarchy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ParentLookup for Hierarchy<T> {
    type Id = NodeId;

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|data| data.parent)
    }
}
