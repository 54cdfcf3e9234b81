//! Signal/slot publishing of hierarchy events.
//!
//! [`HierarchyObserver`] is the notification channel of a hierarchy. Some
//! collaborators (a view layer, an undo log) prefer connecting closures to
//! named signals instead of implementing a trait. [`HierarchySignals`] is an
//! observer that republishes every callback on a [`Signal`].
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - A list of connected slots invoked on emit
//! - [`ConnectionId`] - Identifies a connection for later disconnection
//! - [`HierarchySignals`] - Observer exposing one signal per callback
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use canopy_core::{Hierarchy, HierarchySignals};
//!
//! let mut tree = Hierarchy::new();
//! let root = tree.insert("root");
//! let child = tree.insert("child");
//!
//! let signals = Arc::new(HierarchySignals::new());
//! let added = Arc::new(AtomicUsize::new(0));
//! let counter = added.clone();
//! signals.children_added.connect(move |event| {
//!     counter.fetch_add(event.children.len(), Ordering::SeqCst);
//! });
//! tree.add_observer(root, signals.clone()).unwrap();
//!
//! tree.add_child(root, child).unwrap();
//! assert_eq!(added.load(Ordering::SeqCst), 1);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::logging::targets;
use crate::node::{ChildSet, NodeId};
use crate::observer::{ChildrenChanged, HierarchyObserver, ParentChanged};

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// Slots are invoked directly on the emitting thread, in connection order.
/// The connection list is copied before invoking, so a slot may connect or
/// disconnect slots on the same signal without deadlocking; such changes take
/// effect on the next emit.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    blocked: AtomicBool,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` do nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots with `args`.
    #[tracing::instrument(skip_all, target = "canopy_core::signal", level = "trace")]
    pub fn emit(&self, args: &Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");
        for slot in slots {
            slot(args);
        }
    }
}

/// An observer that republishes hierarchy callbacks as signals.
///
/// Register it with [`Hierarchy::add_observer`](crate::Hierarchy::add_observer)
/// (wrapped in an `Arc`) and connect slots to the public signals.
#[derive(Default)]
pub struct HierarchySignals {
    /// Emitted from [`HierarchyObserver::on_children_added`].
    pub children_added: Signal<ChildrenChanged>,
    /// Emitted from [`HierarchyObserver::on_children_removed`].
    pub children_removed: Signal<ChildrenChanged>,
    /// Emitted from [`HierarchyObserver::on_parent_changed`].
    pub parent_changed: Signal<ParentChanged>,
}

impl HierarchySignals {
    /// Create a set of signals with no connections.
    pub fn new() -> Self {
        Self::default()
    }
}

impl HierarchyObserver for HierarchySignals {
    fn on_children_added(&self, event_source: NodeId, changed_node: NodeId, added: &ChildSet) {
        self.children_added.emit(&ChildrenChanged {
            event_source,
            changed_node,
            children: added.clone(),
        });
    }

    fn on_children_removed(&self, event_source: NodeId, changed_node: NodeId, removed: &ChildSet) {
        self.children_removed.emit(&ChildrenChanged {
            event_source,
            changed_node,
            children: removed.clone(),
        });
    }

    fn on_parent_changed(&self, source: NodeId, new_parent: Option<NodeId>) {
        self.parent_changed.emit(&ParentChanged { source, new_parent });
    }
}
