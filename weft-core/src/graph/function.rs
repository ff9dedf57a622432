//! Functions
//!
//! A [`Function`] is a graph owner: it holds the ordered list of the nodes it
//! owns. The list only tracks membership and order; the nodes themselves are
//! stored by the [`Module`](super::Module), which is also the only place that
//! edits the list, so attaching, erasing and moving nodes always runs the
//! matching use-def bookkeeping.
//!
//! Iteration yields nodes in insertion order. Order carries no meaning for
//! the IR beyond giving every pass a deterministic walk.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::list::{Handle, SlabList};
use super::node::NodeId;

/// Unique identifier for a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u64);

impl FunctionId {
    /// Generate a new unique function ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for FunctionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Ordered membership list of a function.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeList {
    order: SlabList<NodeId>,
    positions: HashMap<NodeId, Handle>,
}

impl NodeList {
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn contains(&self, node: NodeId) -> bool {
        self.positions.contains_key(&node)
    }

    /// Insert `node` before `before`, or at the end.
    ///
    /// Returns `false` if `before` is not in the list.
    pub(crate) fn insert(&mut self, node: NodeId, before: Option<NodeId>) -> bool {
        debug_assert!(!self.contains(node), "{} listed twice", node);
        let at = match before {
            Some(before) => match self.positions.get(&before) {
                Some(handle) => Some(*handle),
                None => return false,
            },
            None => None,
        };
        let handle = self.order.insert_before(at, node);
        self.positions.insert(node, handle);
        true
    }

    pub(crate) fn remove(&mut self, node: NodeId) -> bool {
        match self.positions.remove(&node) {
            Some(handle) => self.order.remove(handle).is_some(),
            None => false,
        }
    }

    /// Collect `first..=last` following list order, or `None` if `last` is
    /// not reachable from `first`.
    pub(crate) fn range(&self, first: NodeId, last: NodeId) -> Option<Vec<NodeId>> {
        let mut cursor = Some(*self.positions.get(&first)?);
        let last = *self.positions.get(&last)?;
        let mut out = Vec::new();
        while let Some(handle) = cursor {
            out.push(*self.order.get(handle)?);
            if handle == last {
                return Some(out);
            }
            cursor = self.order.next(handle);
        }
        None
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }

    fn step(&self, node: NodeId, forward: bool) -> Option<NodeId> {
        let handle = *self.positions.get(&node)?;
        let next = if forward {
            self.order.next(handle)
        } else {
            self.order.prev(handle)
        };
        next.and_then(|handle| self.order.get(handle).copied())
    }
}

/// A graph owner: a named, ordered collection of nodes.
#[derive(Debug, Clone)]
pub struct Function {
    id: FunctionId,
    name: String,
    nodes: NodeList,
}

impl Function {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            id: FunctionId::new(),
            name: name.into(),
            nodes: NodeList::default(),
        }
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes owned.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Check if `node` is owned by this function.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// Owned nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter()
    }

    pub fn first(&self) -> Option<NodeId> {
        self.nodes.iter().next()
    }

    pub fn last(&self) -> Option<NodeId> {
        let handle = self.nodes.order.last()?;
        self.nodes.order.get(handle).copied()
    }

    /// The node after `node` in this function's order.
    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.step(node, true)
    }

    /// The node before `node` in this function's order.
    pub fn prev(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.step(node, false)
    }

    pub(crate) fn list(&self) -> &NodeList {
        &self.nodes
    }

    pub(crate) fn list_mut(&mut self) -> &mut NodeList {
        &mut self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<NodeId> {
        (0..n).map(|_| NodeId::new()).collect()
    }

    #[test]
    fn function_ids_are_unique() {
        assert_ne!(FunctionId::new(), FunctionId::new());
    }

    #[test]
    fn insert_keeps_order() {
        let ids = ids(4);
        let mut list = NodeList::default();
        assert!(list.insert(ids[1], None));
        assert!(list.insert(ids[3], None));
        assert!(list.insert(ids[0], Some(ids[1])));
        assert!(list.insert(ids[2], Some(ids[3])));
        assert_eq!(list.iter().collect::<Vec<_>>(), ids);
        assert!(!list.insert(NodeId::new(), Some(NodeId::new())));
    }

    #[test]
    fn range_follows_order() {
        let ids = ids(5);
        let mut list = NodeList::default();
        for id in &ids {
            list.insert(*id, None);
        }
        assert_eq!(list.range(ids[1], ids[3]), Some(ids[1..=3].to_vec()));
        assert_eq!(list.range(ids[2], ids[2]), Some(vec![ids[2]]));
        assert_eq!(list.range(ids[3], ids[1]), None);
    }

    #[test]
    fn next_and_prev() {
        let ids = ids(3);
        let mut function = Function::new("f");
        for id in &ids {
            function.list_mut().insert(*id, None);
        }
        assert_eq!(function.first(), Some(ids[0]));
        assert_eq!(function.last(), Some(ids[2]));
        assert_eq!(function.next(ids[0]), Some(ids[1]));
        assert_eq!(function.prev(ids[0]), None);

        function.list_mut().remove(ids[1]);
        assert_eq!(function.next(ids[0]), Some(ids[2]));
        assert_eq!(function.len(), 2);
    }
}
