//! Ancestry tests and ancestor walks.
//!
//! These functions only need to know how to get from a node to its parent,
//! expressed by the [`ParentLookup`] capability. They are used by the
//! hierarchy for cycle rejection and for muting relayed events during moves,
//! and are usable on their own against any parent-linked structure.

/// Capability to resolve the parent of a node.
pub trait ParentLookup {
    /// The node identity type, compared by identity.
    type Id: Copy + Eq;

    /// The parent of `id`, or `None` for roots and unknown nodes.
    fn parent_of(&self, id: Self::Id) -> Option<Self::Id>;
}

/// Returns `true` if `candidate` is a strict ancestor of `node`.
///
/// A node is never its own ancestor.
pub fn is_ancestor_of<L: ParentLookup + ?Sized>(lookup: &L, candidate: L::Id, node: L::Id) -> bool {
    ancestors(lookup, node).any(|ancestor| ancestor == candidate)
}

/// Returns `true` if `node` lies in the subtree rooted at `root` (including `root` itself).
pub fn subtree_contains<L: ParentLookup + ?Sized>(lookup: &L, root: L::Id, node: L::Id) -> bool {
    root == node || is_ancestor_of(lookup, root, node)
}

/// Iterate the ancestors of `node`, from its parent up to the root.
pub fn ancestors<L: ParentLookup + ?Sized>(lookup: &L, node: L::Id) -> Ancestors<'_, L> {
    Ancestors {
        lookup,
        next: lookup.parent_of(node),
    }
}

/// Iterator over the ancestors of a node. Created by [`ancestors`].
pub struct Ancestors<'a, L: ParentLookup + ?Sized> {
    lookup: &'a L,
    next: Option<L::Id>,
}

impl<L: ParentLookup + ?Sized> Iterator for Ancestors<'_, L> {
    type Item = L::Id;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.lookup.parent_of(current);
        Some(current)
    }
}
