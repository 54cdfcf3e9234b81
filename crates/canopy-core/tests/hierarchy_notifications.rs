//! Integration tests for hierarchy structure and change notification.

use std::sync::Arc;

use canopy_core::{
    ChildSet, Hierarchy, HierarchyError, HierarchyObserver, NodeId, SharedHierarchy,
};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Added {
        source: NodeId,
        changed: NodeId,
        children: ChildSet,
    },
    Removed {
        source: NodeId,
        changed: NodeId,
        children: ChildSet,
    },
    Parent {
        source: NodeId,
        new_parent: Option<NodeId>,
    },
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    fn added(&self) -> ChildSet {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Added { children, .. } => Some(children.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn removed(&self) -> ChildSet {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Removed { children, .. } => Some(children.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl HierarchyObserver for Recorder {
    fn on_children_added(&self, source: NodeId, changed: NodeId, added: &ChildSet) {
        self.events.lock().push(Event::Added {
            source,
            changed,
            children: added.clone(),
        });
    }

    fn on_children_removed(&self, source: NodeId, changed: NodeId, removed: &ChildSet) {
        self.events.lock().push(Event::Removed {
            source,
            changed,
            children: removed.clone(),
        });
    }

    fn on_parent_changed(&self, source: NodeId, new_parent: Option<NodeId>) {
        self.events.lock().push(Event::Parent { source, new_parent });
    }
}

fn observe<T>(tree: &mut Hierarchy<T>, id: NodeId) -> Arc<Recorder> {
    let recorder = Arc::new(Recorder::default());
    tree.add_observer(id, recorder.clone()).unwrap();
    recorder
}

fn set(ids: &[NodeId]) -> ChildSet {
    ids.iter().copied().collect()
}

// =============================================================================
// Structure
// =============================================================================

#[test]
fn test_moves_never_duplicate_children() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let parent = tree.insert("parent");
    let prior_in_parent = tree.insert("prior in parent");
    let node = tree.insert("node");
    let child = tree.insert("child");
    let prior_in_child = tree.insert("prior in child");

    tree.add_child(parent, prior_in_parent).unwrap();
    tree.add_child(child, prior_in_child).unwrap();
    tree.add_child(parent, node).unwrap();
    tree.add_child(node, child).unwrap();

    tree.add_child(node, prior_in_parent).unwrap();
    tree.add_child(node, prior_in_child).unwrap();

    assert_eq!(*tree.children(parent).unwrap(), set(&[node]));
    assert_eq!(
        *tree.children(node).unwrap(),
        set(&[child, prior_in_child, prior_in_parent])
    );
    assert!(tree.children(child).unwrap().is_empty());
    assert!(tree.is_consistent());
}

#[test]
fn test_remove_tolerates_non_children() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let parent = tree.insert(0);
    let child = tree.insert(1);
    let stranger = tree.insert(2);
    tree.add_child(parent, child).unwrap();
    let events = observe(&mut tree, parent);

    assert!(!tree.remove_child(parent, stranger).unwrap());
    assert!(tree.remove_children(parent, [stranger, child]).unwrap());

    assert!(tree.children(parent).unwrap().is_empty());
    assert_eq!(
        events.events(),
        vec![Event::Removed {
            source: parent,
            changed: parent,
            children: set(&[child]),
        }]
    );
}

#[test]
fn test_invalid_parentage_is_rejected() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let root = tree.insert("root");
    let middle = tree.insert("middle");
    let leaf = tree.insert("leaf");
    tree.add_child(root, middle).unwrap();
    tree.add_child(middle, leaf).unwrap();

    let err = tree.set_parent(root, Some(root)).unwrap_err();
    assert_eq!(err, HierarchyError::SelfParent(root));
    assert!(err.is_invalid_argument());

    let err = tree.add_child(leaf, root).unwrap_err();
    assert_eq!(
        err,
        HierarchyError::CircularParentage {
            node: root,
            parent: leaf
        }
    );

    let removed = tree.insert("gone");
    tree.remove(removed).unwrap();
    let err = tree.add_child(root, removed).unwrap_err();
    assert!(err.is_unknown_node());

    assert_eq!(tree.depth(leaf).unwrap(), 2);
    assert!(tree.is_consistent());
}

#[test]
fn test_set_parent_reflects_in_both_parents() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let first = tree.insert("first");
    let second = tree.insert("second");
    let child = tree.insert("child");

    tree.set_parent(child, Some(first)).unwrap();
    tree.set_parent(child, Some(second)).unwrap();
    assert!(tree.children(first).unwrap().is_empty());
    assert_eq!(*tree.children(second).unwrap(), set(&[child]));

    tree.set_parent(child, None).unwrap();
    assert!(tree.children(second).unwrap().is_empty());
    assert_eq!(tree.parent(child).unwrap(), None);
}

// =============================================================================
// Direct notification
// =============================================================================

#[test]
fn test_batch_add_notifies_once_with_new_children_only() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let parent = tree.insert("parent");
    let a = tree.insert("a");
    let b = tree.insert("b");
    let c = tree.insert("c");
    tree.add_child(parent, a).unwrap();
    let events = observe(&mut tree, parent);

    tree.add_children(parent, [a, b, c]).unwrap();
    tree.add_children(parent, [a, b]).unwrap();

    assert_eq!(
        events.events(),
        vec![Event::Added {
            source: parent,
            changed: parent,
            children: set(&[b, c]),
        }]
    );
}

#[test]
fn test_batch_remove_notifies_once_with_contained_children_only() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let parent = tree.insert("parent");
    let a = tree.insert("a");
    let b = tree.insert("b");
    let other = tree.insert("other");
    tree.add_children(parent, [a, b]).unwrap();
    let events = observe(&mut tree, parent);

    tree.remove_children(parent, [a, b, other]).unwrap();

    assert_eq!(
        events.events(),
        vec![Event::Removed {
            source: parent,
            changed: parent,
            children: set(&[a, b]),
        }]
    );
}

#[test]
fn test_clear_children_is_a_single_batch() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let parent = tree.insert(0);
    let children: Vec<NodeId> = (1..=4).map(|n| tree.insert(n)).collect();
    tree.add_children(parent, children.iter().copied()).unwrap();
    let events = observe(&mut tree, parent);

    tree.clear_children(parent).unwrap();
    tree.clear_children(parent).unwrap();

    assert_eq!(events.events().len(), 1);
    assert_eq!(events.removed(), set(&children));
    for child in children {
        assert_eq!(tree.parent(child).unwrap(), None);
    }
}

#[test]
fn test_parent_change_is_observable_but_not_transitive() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let root = tree.insert("root");
    let first = tree.insert("first");
    let second = tree.insert("second");
    let root_events = observe(&mut tree, root);
    let first_events = observe(&mut tree, first);
    let second_events = observe(&mut tree, second);

    tree.add_child(root, first).unwrap();
    tree.add_children(root, [second]).unwrap();
    root_events.take();

    tree.set_parent(first, None).unwrap();
    tree.set_parent(second, None).unwrap();

    assert!(
        !root_events
            .events()
            .iter()
            .any(|event| matches!(event, Event::Parent { .. }))
    );
    assert_eq!(
        first_events.events(),
        vec![
            Event::Parent {
                source: first,
                new_parent: Some(root)
            },
            Event::Parent {
                source: first,
                new_parent: None
            },
        ]
    );
    assert_eq!(second_events.events().len(), 2);
}

#[test]
fn test_move_delivers_removed_then_added_then_parent_changed() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let root = tree.insert("root");
    let a = tree.insert("a");
    let b = tree.insert("b");
    let x = tree.insert("x");
    tree.add_children(root, [a, b]).unwrap();
    tree.add_child(a, x).unwrap();

    let log = Arc::new(Recorder::default());
    for id in [a, b, x] {
        tree.add_observer(id, log.clone()).unwrap();
    }

    tree.set_parent(x, Some(b)).unwrap();

    assert_eq!(
        log.events(),
        vec![
            Event::Removed {
                source: a,
                changed: a,
                children: set(&[x]),
            },
            Event::Added {
                source: b,
                changed: b,
                children: set(&[x]),
            },
            Event::Parent {
                source: x,
                new_parent: Some(b)
            },
        ]
    );
}

// =============================================================================
// Transitive notification
// =============================================================================

#[test]
fn test_subtree_changes_reach_ancestors() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let root = tree.insert("root");
    let observed = tree.insert("observed");
    tree.add_child(root, observed).unwrap();
    let events = observe(&mut tree, root);

    let single = tree.insert("single");
    let multi = tree.insert("multi");
    tree.add_child(observed, single).unwrap();
    tree.add_children(observed, [multi]).unwrap();
    tree.remove_child(observed, single).unwrap();
    tree.remove_children(observed, [multi]).unwrap();

    assert_eq!(events.added(), set(&[single, multi]));
    assert_eq!(events.removed(), set(&[single, multi]));
    for event in events.events() {
        match event {
            Event::Added { source, changed, .. } | Event::Removed { source, changed, .. } => {
                assert_eq!(source, root);
                assert_eq!(changed, observed);
            }
            Event::Parent { .. } => panic!("parent changes are not forwarded"),
        }
    }
}

#[test]
fn test_detached_subtree_is_muted() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let root = tree.insert("root");
    let first = tree.insert("first");
    let second = tree.insert("second");
    tree.add_children(root, [first, second]).unwrap();
    let events = observe(&mut tree, root);

    tree.remove_child(root, first).unwrap();
    tree.remove_children(root, [second]).unwrap();
    events.take();

    for owner in [first, second] {
        let single = tree.insert("single");
        tree.add_child(owner, single).unwrap();
        tree.remove_child(owner, single).unwrap();
    }

    assert!(events.events().is_empty());
}

#[test]
fn test_move_inside_branch_is_suppressed_at_common_ancestor() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let root = tree.insert("root");
    let new_parent = tree.insert("new parent");
    let old_parent = tree.insert("old parent");
    let moving = tree.insert("moving");
    tree.add_children(root, [new_parent, old_parent]).unwrap();
    tree.add_child(old_parent, moving).unwrap();

    let root_events = observe(&mut tree, root);
    let new_events = observe(&mut tree, new_parent);
    let old_events = observe(&mut tree, old_parent);

    assert_eq!(tree.parent(moving).unwrap(), Some(old_parent));
    tree.set_parent(moving, Some(new_parent)).unwrap();
    assert_eq!(tree.parent(moving).unwrap(), Some(new_parent));

    assert!(old_events.added().is_empty());
    assert_eq!(old_events.removed(), set(&[moving]));
    assert_eq!(new_events.added(), set(&[moving]));
    assert!(new_events.removed().is_empty());

    assert!(root_events.events().is_empty());
}

#[test]
fn test_move_across_trees_is_reported_to_both() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let left_root = tree.insert("left root");
    let left = tree.insert("left");
    let right_root = tree.insert("right root");
    let right = tree.insert("right");
    let moving = tree.insert("moving");
    tree.add_child(left_root, left).unwrap();
    tree.add_child(right_root, right).unwrap();
    tree.add_child(left, moving).unwrap();

    let left_events = observe(&mut tree, left_root);
    let right_events = observe(&mut tree, right_root);

    tree.add_child(right, moving).unwrap();

    assert_eq!(
        left_events.events(),
        vec![Event::Removed {
            source: left_root,
            changed: left,
            children: set(&[moving]),
        }]
    );
    assert_eq!(
        right_events.events(),
        vec![Event::Added {
            source: right_root,
            changed: right,
            children: set(&[moving]),
        }]
    );
}

#[test]
fn test_batch_move_mutes_only_internal_children() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let root = tree.insert("root");
    let a = tree.insert("a");
    let b = tree.insert("b");
    let inside = tree.insert("inside");
    let outside_root = tree.insert("outside root");
    let outside = tree.insert("outside");
    tree.add_children(root, [a, b]).unwrap();
    tree.add_child(a, inside).unwrap();
    tree.add_child(outside_root, outside).unwrap();

    let root_events = observe(&mut tree, root);
    let outside_events = observe(&mut tree, outside_root);

    tree.add_children(b, [inside, outside]).unwrap();

    assert_eq!(
        root_events.events(),
        vec![Event::Added {
            source: root,
            changed: b,
            children: set(&[outside]),
        }]
    );
    assert_eq!(
        outside_events.events(),
        vec![Event::Removed {
            source: outside_root,
            changed: outside_root,
            children: set(&[outside]),
        }]
    );
}

// =============================================================================
// Observer registration
// =============================================================================

#[test]
fn test_multiple_observers_coexist() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let parent = tree.insert("parent");
    let child = tree.insert("child");
    let first = observe(&mut tree, parent);
    let second = observe(&mut tree, parent);
    assert_eq!(tree.observer_count(parent).unwrap(), 2);

    tree.add_child(parent, child).unwrap();

    assert_eq!(first.added(), set(&[child]));
    assert_eq!(second.added(), set(&[child]));
}

#[test]
fn test_observers_are_removable() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let parent = tree.insert("parent");
    let child = tree.insert("child");
    let recorder = Arc::new(Recorder::default());
    let id = tree.add_observer(parent, recorder.clone()).unwrap();

    assert!(tree.remove_observer(parent, id).unwrap());
    assert!(!tree.remove_observer(parent, id).unwrap());
    tree.add_child(parent, child).unwrap();

    assert!(recorder.events().is_empty());
    assert_eq!(tree.observer_count(parent).unwrap(), 0);
}

#[test]
fn test_observer_id_from_another_node_removes_nothing() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let a = tree.insert("a");
    let b = tree.insert("b");
    let child = tree.insert("child");
    let on_a = Arc::new(Recorder::default());
    let on_b = Arc::new(Recorder::default());
    let a_id = tree.add_observer(a, on_a.clone()).unwrap();
    tree.add_observer(b, on_b.clone()).unwrap();

    assert!(!tree.remove_observer(b, a_id).unwrap());
    assert_eq!(tree.observer_count(b).unwrap(), 1);

    tree.add_child(b, child).unwrap();
    assert_eq!(on_b.added(), set(&[child]));
    assert!(on_a.events().is_empty());
}

#[test]
fn test_registering_an_observer_twice_keeps_one_registration() {
    init_tracing();
    let mut tree = Hierarchy::new();
    let root = tree.insert("root");
    let branch = tree.insert("branch");
    let leaf = tree.insert("leaf");
    tree.add_child(root, branch).unwrap();

    let recorder = Arc::new(Recorder::default());
    let first = tree.add_observer(root, recorder.clone()).unwrap();
    let second = tree.add_observer(root, recorder.clone()).unwrap();
    assert_eq!(first, second);

    tree.add_child(branch, leaf).unwrap();
    assert_eq!(
        recorder.events(),
        vec![Event::Added {
            source: root,
            changed: branch,
            children: set(&[leaf]),
        }]
    );

    // One removal undoes the registration entirely.
    assert!(tree.remove_observer(root, first).unwrap());
    tree.remove_child(branch, leaf).unwrap();
    assert_eq!(recorder.events().len(), 1);
}

#[test]
fn test_shared_hierarchy_delivers_events() {
    init_tracing();
    let shared = SharedHierarchy::new();
    let root = shared.insert("root");
    let branch = shared.insert("branch");
    let leaf = shared.insert("leaf");
    shared.add_child(root, branch).unwrap();

    let recorder = Arc::new(Recorder::default());
    shared.add_observer(root, recorder.clone()).unwrap();
    shared.add_child(branch, leaf).unwrap();

    assert_eq!(
        recorder.events(),
        vec![Event::Added {
            source: root,
            changed: branch,
            children: set(&[leaf]),
        }]
    );
    assert_eq!(shared.ancestors(leaf).unwrap(), vec![branch, root]);
}
