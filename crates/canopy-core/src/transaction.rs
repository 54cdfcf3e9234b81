//! Mutation transactions.
//!
//! Every structural operation on a [`Hierarchy`](crate::Hierarchy) runs
//! inside a [`Transaction`]. The transaction walks through
//! `Idle -> Detaching -> Attaching -> Notifying -> Idle`, collecting the
//! events produced by each phase. Nothing is delivered until the structure
//! is consistent again, so observers never see a half-applied move.
//!
//! A transaction also remembers every node that changed parents while it
//! already had one (a *move*), together with the ancestor chain of the old
//! parent as it was before the move. Relayed events use this to tell a node
//! that merely moved inside an observer's subtree from one that entered or
//! left it.

use std::collections::BTreeMap;

use crate::node::{ChildSet, NodeId};
use crate::traversal::{subtree_contains, ParentLookup};

/// Lifecycle of a transaction. Phases only ever move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Phase {
    Idle,
    Detaching,
    Attaching,
    Notifying,
}

/// A node relocated from one parent to another within a transaction.
#[derive(Clone, Debug)]
pub(crate) struct MoveRecord {
    pub(crate) to: NodeId,
    /// The old parent followed by its ancestors, captured before detaching.
    pub(crate) from_chain: Vec<NodeId>,
}

impl MoveRecord {
    pub(crate) fn from(&self) -> NodeId {
        self.from_chain[0]
    }
}

/// A child-set event waiting for delivery.
#[derive(Clone, Debug)]
pub(crate) struct ChildEvent {
    pub(crate) changed_node: NodeId,
    pub(crate) children: ChildSet,
}

/// Context object for one structural operation.
#[derive(Debug)]
pub(crate) struct Transaction {
    phase: Phase,
    moves: BTreeMap<NodeId, MoveRecord>,
    removed: Vec<ChildEvent>,
    added: Option<ChildEvent>,
    parent_changes: Vec<(NodeId, Option<NodeId>)>,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Idle,
            moves: BTreeMap::new(),
            removed: Vec::new(),
            added: None,
            parent_changes: Vec::new(),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance to `next`. Phases may be skipped but never revisited.
    pub(crate) fn enter(&mut self, next: Phase) {
        debug_assert!(
            next > self.phase,
            "transaction cannot go from {:?} to {:?}",
            self.phase,
            next
        );
        self.phase = next;
    }

    /// Record that `node` moves from the head of `from_chain` to `to`.
    pub(crate) fn record_move(&mut self, node: NodeId, to: NodeId, from_chain: Vec<NodeId>) {
        debug_assert!(!from_chain.is_empty());
        self.moves.insert(node, MoveRecord { to, from_chain });
    }

    pub(crate) fn moves(&self) -> impl Iterator<Item = (&NodeId, &MoveRecord)> {
        self.moves.iter()
    }

    pub(crate) fn record_removed(&mut self, changed_node: NodeId, children: ChildSet) {
        debug_assert_eq!(self.phase, Phase::Detaching);
        if !children.is_empty() {
            self.removed.push(ChildEvent {
                changed_node,
                children,
            });
        }
    }

    pub(crate) fn record_added(&mut self, changed_node: NodeId, children: ChildSet) {
        debug_assert_eq!(self.phase, Phase::Attaching);
        debug_assert!(self.added.is_none(), "one added event per transaction");
        if !children.is_empty() {
            self.added = Some(ChildEvent {
                changed_node,
                children,
            });
        }
    }

    pub(crate) fn record_parent_change(&mut self, node: NodeId, new_parent: Option<NodeId>) {
        self.parent_changes.push((node, new_parent));
    }

    /// Whether the transaction produced nothing to report.
    pub(crate) fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_none() && self.parent_changes.is_empty()
    }

    /// Hand over the queued events in delivery order.
    pub(crate) fn drain(
        &mut self,
    ) -> (Vec<ChildEvent>, Option<ChildEvent>, Vec<(NodeId, Option<NodeId>)>) {
        debug_assert_eq!(self.phase, Phase::Notifying);
        (
            std::mem::take(&mut self.removed),
            self.added.take(),
            std::mem::take(&mut self.parent_changes),
        )
    }

    pub(crate) fn finish(&mut self) {
        self.phase = Phase::Idle;
        self.moves.clear();
    }

    /// Whether moving `node` left it inside the subtree of `owner` both before and after.
    ///
    /// `lookup` must reflect the structure after the transaction was applied.
    pub(crate) fn is_internal_move<L>(&self, lookup: &L, owner: NodeId, node: NodeId) -> bool
    where
        L: ParentLookup<Id = NodeId> + ?Sized,
    {
        self.moves.get(&node).is_some_and(|record| {
            record.from_chain.contains(&owner) && subtree_contains(lookup, owner, record.to)
        })
    }

    /// The part of `children` that actually entered or left `owner`'s subtree.
    pub(crate) fn visible_to<L>(&self, lookup: &L, owner: NodeId, children: &ChildSet) -> ChildSet
    where
        L: ParentLookup<Id = NodeId> + ?Sized,
    {
        if self.moves.is_empty() {
            return children.clone();
        }
        children
            .iter()
            .copied()
            .filter(|&child| !self.is_internal_move(lookup, owner, child))
            .collect()
    }
}
