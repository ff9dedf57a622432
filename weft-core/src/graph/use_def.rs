//! Use-Def Tracking
//!
//! Every node keeps one [`UseList`] covering all of its results. Each entry is
//! a [`NodeUse`]: "slot `slot` of node `user` currently reads result `resno`
//! of this node". The consumer keeps the [`UseToken`] of that entry next to
//! the operand value, so unlinking an operand is O(1) on both sides.
//!
//! Only [`Module`](super::Module) writes use lists, and it always updates the
//! consumer slot and the producer entry in the same call.
//!
//! # Mutation during iteration
//!
//! [`UsesOf`] borrows the use list, so no rewrite can run while it is alive.
//! Rewrites that walk uses (`replace_all_uses_of_with`, `release_users`)
//! first snapshot the matching tokens with [`UseList::tokens_for`] and then
//! apply the edits one token at a time.

use smallvec::SmallVec;

use super::list::{Entries, Handle, SlabList};
use super::node::NodeId;
use super::value::NodeValue;

/// An operand position inside a consuming node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandSlot {
    /// The n'th input.
    Input(u32),
    /// The guarding predicate.
    Predicate,
}

/// One recorded use of a node's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeUse {
    user: NodeId,
    slot: OperandSlot,
    value: NodeValue,
}

impl NodeUse {
    /// The consuming node.
    pub fn user(&self) -> NodeId {
        self.user
    }

    /// The operand slot of the consumer that holds the reference.
    pub fn slot(&self) -> OperandSlot {
        self.slot
    }

    /// The referenced result (always a result of the list's owner).
    pub fn value(&self) -> NodeValue {
        self.value
    }
}

/// Position token of a [`NodeUse`] inside its [`UseList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UseToken(Handle);

/// Operand storage of a consuming node: the value plus the token of the use
/// record registered for it, if the node is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Operand {
    pub(crate) value: NodeValue,
    pub(crate) token: Option<UseToken>,
}

impl Operand {
    pub(crate) fn detached(value: NodeValue) -> Self {
        Self { value, token: None }
    }
}

/// Combined use list of all results of one node, in registration order.
#[derive(Debug, Clone, Default)]
pub struct UseList {
    uses: SlabList<NodeUse>,
}

impl UseList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.uses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uses.is_empty()
    }

    /// Check if the record at `token` is still in the list.
    pub fn contains(&self, token: UseToken) -> bool {
        self.uses.contains(token.0)
    }

    pub fn get(&self, token: UseToken) -> Option<&NodeUse> {
        self.uses.get(token.0)
    }

    /// Iterate all uses of all results.
    pub fn iter(&self) -> impl Iterator<Item = &NodeUse> + '_ {
        self.uses.iter()
    }

    /// Iterate all uses together with their tokens.
    pub fn entries(&self) -> impl Iterator<Item = (UseToken, &NodeUse)> + '_ {
        self.uses
            .entries()
            .map(|(handle, node_use)| (UseToken(handle), node_use))
    }

    /// Iterate the uses of one result.
    pub fn uses_of(&self, value: NodeValue) -> UsesOf<'_> {
        UsesOf {
            inner: Some(self.uses.entries()),
            value,
        }
    }

    /// Snapshot the tokens of the uses of result `resno`, or of every result
    /// when `resno` is `None`.
    pub fn tokens_for(&self, resno: Option<u32>) -> SmallVec<[UseToken; 8]> {
        self.entries()
            .filter(|(_, node_use)| resno.map_or(true, |r| node_use.value.resno() == r))
            .map(|(token, _)| token)
            .collect()
    }

    /// Register that `slot` of `user` now reads `value`.
    pub(crate) fn add_use(&mut self, user: NodeId, slot: OperandSlot, value: NodeValue) -> UseToken {
        UseToken(self.uses.push_back(NodeUse { user, slot, value }))
    }

    /// Remove the record at `token`. Returns `None` if it was already gone.
    pub(crate) fn remove_use(&mut self, token: UseToken) -> Option<NodeUse> {
        self.uses.remove(token.0)
    }
}

/// Lazy iterator over the uses of one result of a node.
///
/// Built on the node's combined use list; skips entries that read a
/// different result. It cannot be restarted: build a new one to rescan.
pub struct UsesOf<'a> {
    inner: Option<Entries<'a, NodeUse>>,
    value: NodeValue,
}

impl UsesOf<'_> {
    /// An iterator that yields nothing, for values without a stored node.
    pub(crate) fn empty() -> Self {
        Self {
            inner: None,
            value: NodeValue::null(),
        }
    }
}

impl<'a> Iterator for UsesOf<'a> {
    type Item = &'a NodeUse;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.inner.as_mut()?;
        for (_, node_use) in inner {
            debug_assert_eq!(
                node_use.value.node(),
                self.value.node(),
                "use list holds a record for a different node"
            );
            if node_use.value.resno() == self.value.resno() {
                return Some(node_use);
            }
        }
        None
    }
}
