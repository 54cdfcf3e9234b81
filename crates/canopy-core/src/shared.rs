//! Lock-protected access to a hierarchy.
//!
//! [`Hierarchy`] itself relies on `&mut self` for exclusive mutation. When a
//! forest has to be reachable from several places (or threads),
//! [`SharedHierarchy`] wraps it in a `RwLock`: queries share a read lock, and
//! every structural operation holds the write lock for its entire duration,
//! including event delivery. At most one mutation is in flight at a time.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::hierarchy::Hierarchy;
use crate::node::{ChildSet, NodeId};
use crate::observer::{HierarchyObserver, ObserverId};

/// A thread-safe wrapper around [`Hierarchy`].
///
/// Observers are invoked while the write lock is held. An observer that
/// calls back into the same `SharedHierarchy` deadlocks.
///
/// # Related
///
/// - [`Hierarchy`] - The underlying forest
pub struct SharedHierarchy<T> {
    inner: RwLock<Hierarchy<T>>,
}

impl<T> SharedHierarchy<T> {
    /// Create a new shared hierarchy.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Hierarchy::new()),
        }
    }

    /// Add a detached node.
    pub fn insert(&self, payload: T) -> NodeId {
        self.inner.write().insert(payload)
    }

    /// Remove a node and return its payload.
    pub fn remove(&self, id: NodeId) -> Result<T> {
        self.inner.write().remove(id)
    }

    /// Check if a node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.read().contains(id)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Get the parent of a node.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.inner.read().parent(id)
    }

    /// Get the children of a node (returns an owned set for thread safety).
    pub fn children(&self, id: NodeId) -> Result<ChildSet> {
        self.inner.read().children(id).cloned()
    }

    /// Get all ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.inner.read().ancestors(id)
    }

    /// Get the roots of all trees.
    pub fn roots(&self) -> Vec<NodeId> {
        self.inner.read().roots().collect()
    }

    /// Set the parent of a node.
    pub fn set_parent(&self, id: NodeId, parent: Option<NodeId>) -> Result<bool> {
        self.inner.write().set_parent(id, parent)
    }

    /// Attach a child.
    pub fn add_child(&self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.inner.write().add_child(parent, child)
    }

    /// Attach several children with a single notification.
    pub fn add_children<I>(&self, parent: NodeId, children: I) -> Result<bool>
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.inner.write().add_children(parent, children)
    }

    /// Detach a child.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.inner.write().remove_child(parent, child)
    }

    /// Detach several children with a single notification.
    pub fn remove_children<I>(&self, parent: NodeId, children: I) -> Result<bool>
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.inner.write().remove_children(parent, children)
    }

    /// Detach all children while holding the write lock.
    pub fn clear_children(&self, parent: NodeId) -> Result<()> {
        self.inner.write().clear_children(parent)
    }

    /// Register an observer on a node.
    pub fn add_observer(
        &self,
        id: NodeId,
        observer: Arc<dyn HierarchyObserver>,
    ) -> Result<ObserverId> {
        self.inner.write().add_observer(id, observer)
    }

    /// Unregister an observer from a node.
    pub fn remove_observer(&self, id: NodeId, observer: ObserverId) -> Result<bool> {
        self.inner.write().remove_observer(id, observer)
    }

    /// Execute a function with read access to the hierarchy.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Hierarchy<T>) -> R,
    {
        f(&self.inner.read())
    }

    /// Execute a function with write access to the hierarchy.
    pub fn with_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Hierarchy<T>) -> R,
    {
        f(&mut self.inner.write())
    }

    /// Consume the wrapper and return the hierarchy.
    pub fn into_inner(self) -> Hierarchy<T> {
        self.inner.into_inner()
    }
}

impl<T> Default for SharedHierarchy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Hierarchy<T>> for SharedHierarchy<T> {
    fn from(hierarchy: Hierarchy<T>) -> Self {
        Self {
            inner: RwLock::new(hierarchy),
        }
    }
}

static_assertions::assert_impl_all!(SharedHierarchy<String>: Send, Sync);
