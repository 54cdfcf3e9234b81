//! Observable parent/child hierarchies.
//!
//! This crate provides a forest of nodes in which each node has at most one
//! parent and any number of children:
//!
//! - **Hierarchy**: Arena-backed forest with consistent parent/child links
//! - **Batch Operations**: Attach or detach many children with one notification
//! - **Observers**: Per-node listeners with events forwarded to every ancestor
//! - **Move Suppression**: Relocations inside an observed subtree stay silent
//! - **Signals**: Closure-based republishing of hierarchy events
//!
//! # Hierarchy Example
//!
//! ```
//! use canopy_core::Hierarchy;
//!
//! let mut tree = Hierarchy::new();
//! let root = tree.insert("root");
//! let left = tree.insert("left");
//! let right = tree.insert("right");
//!
//! // Attach both children in one step
//! tree.add_children(root, [left, right]).unwrap();
//! assert_eq!(tree.parent(left).unwrap(), Some(root));
//! assert_eq!(tree.child_count(root).unwrap(), 2);
//!
//! // Reparenting keeps both sides consistent
//! tree.set_parent(right, Some(left)).unwrap();
//! assert!(tree.is_ancestor_of(root, right));
//! assert!(!tree.children(root).unwrap().contains(&right));
//! ```
//!
//! # Observer Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use canopy_core::{ChildSet, Hierarchy, HierarchyObserver, NodeId};
//!
//! #[derive(Default)]
//! struct CountAdds(AtomicUsize);
//!
//! impl HierarchyObserver for CountAdds {
//!     fn on_children_added(&self, _source: NodeId, _changed: NodeId, added: &ChildSet) {
//!         self.0.fetch_add(added.len(), Ordering::SeqCst);
//!     }
//! }
//!
//! let mut tree = Hierarchy::new();
//! let grandparent = tree.insert(0);
//! let parent = tree.insert(1);
//! tree.add_child(grandparent, parent).unwrap();
//!
//! let counter = Arc::new(CountAdds::default());
//! tree.add_observer(grandparent, counter.clone()).unwrap();
//!
//! // Events on `parent` reach the observer on `grandparent`
//! let leaf = tree.insert(2);
//! tree.add_child(parent, leaf).unwrap();
//! assert_eq!(counter.0.load(Ordering::SeqCst), 1);
//! ```

mod error;
pub mod hierarchy;
pub mod logging;
mod node;
pub mod observer;
mod shared;
pub mod signal;
mod transaction;
pub mod traversal;

pub use error::{HierarchyError, Result};
pub use hierarchy::Hierarchy;
pub use logging::{HierarchyTreeDebug, PerfSpan, TreeFormatOptions, TreeStyle};
pub use node::{ChildSet, NodeId};
pub use observer::{ChildChange, ChildrenChanged, HierarchyObserver, ObserverId, ParentChanged};
pub use shared::SharedHierarchy;
pub use signal::{ConnectionId, HierarchySignals, Signal};
pub use traversal::ParentLookup;
