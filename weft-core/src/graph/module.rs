//! Module
//!
//! The module stores every attached node and the functions that own them.
//! It is the only place where an attached node's operand slots change, and
//! every such change updates the consumer slot and the producer's use list
//! together:
//!
//! 1. The old use record (if the slot was connected) is removed from the old
//!    producer's list, using the token kept in the slot.
//! 2. A new record is added to the new producer's list (if the new value is
//!    not null), and its token is written back into the slot.
//!
//! Because nodes of every function live in one map, moving nodes between
//! functions never touches operands or use lists.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::function::{Function, FunctionId};
use super::node::{Node, NodeId};
use super::use_def::{NodeUse, Operand, OperandSlot, UseToken, UsesOf};
use super::value::NodeValue;
use crate::error::GraphError;
use crate::types::TypeRef;

/// Owner of all nodes and functions of one compilation unit.
#[derive(Debug, Default)]
pub struct Module {
    /// All attached nodes, indexed by ID.
    nodes: HashMap<NodeId, Node>,

    /// Functions in creation order.
    functions: IndexMap<FunctionId, Function>,
}

impl Module {
    /// Create a new empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty function.
    pub fn create_function(&mut self, name: impl Into<String>) -> FunctionId {
        let function = Function::new(name);
        let id = function.id();
        debug!(function = %id, name = function.name(), "created function");
        self.functions.insert(id, function);
        id
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(&id)
    }

    /// Functions in creation order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Erase a function and every node it owns.
    ///
    /// Nodes are torn down in list order. Uses of them from other functions
    /// are reset to null.
    pub fn erase_function(&mut self, id: FunctionId) -> Result<(), GraphError> {
        let owned: Vec<NodeId> = self.function_ref(id)?.nodes().collect();
        for node in owned {
            self.erase_node(id, node)?;
        }
        self.functions.shift_remove(&id);
        debug!(function = %id, "erased function");
        Ok(())
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get the total number of attached nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes owned by `function`, in order.
    pub fn nodes_of(&self, function: FunctionId) -> Result<impl Iterator<Item = &Node>, GraphError> {
        let function = self.function_ref(function)?;
        Ok(function.nodes().filter_map(|id| self.nodes.get(&id)))
    }

    /// Attach `node` at the end of `function`.
    ///
    /// Registers a use record for every connected operand slot. Operands
    /// must refer to nodes already stored in this module.
    pub fn add_node(&mut self, function: FunctionId, node: Node) -> Result<NodeId, GraphError> {
        self.attach(function, node, None)
    }

    /// Attach `node` to `function`, placed before `before`.
    pub fn insert_node_before(
        &mut self,
        function: FunctionId,
        before: NodeId,
        node: Node,
    ) -> Result<NodeId, GraphError> {
        self.attach(function, node, Some(before))
    }

    /// Point input `idx` of `node` at `value`.
    ///
    /// # Panics
    ///
    /// Panics if `node` has no input `idx`.
    pub fn set_nth_input(
        &mut self,
        node: NodeId,
        idx: usize,
        value: NodeValue,
    ) -> Result<(), GraphError> {
        let inputs = self.node_ref(node)?.num_inputs();
        assert!(idx < inputs, "{} has {} inputs, cannot set input {}", node, inputs, idx);
        self.check_target(node, value)?;
        self.set_slot(node, OperandSlot::Input(idx as u32), value);
        Ok(())
    }

    /// Guard `node` with `value`, or clear its predicate with a null value.
    pub fn set_predicate(&mut self, node: NodeId, value: NodeValue) -> Result<(), GraphError> {
        self.node_ref(node)?;
        self.check_target(node, value)?;
        self.set_slot(node, OperandSlot::Predicate, value);
        Ok(())
    }

    /// Set the type of result `resno` of `node`. Consumers are not re-checked.
    pub fn set_type(&mut self, node: NodeId, resno: usize, ty: TypeRef) -> Result<(), GraphError> {
        self.node_mut(node)?.set_type(resno, ty);
        Ok(())
    }

    pub fn set_name(&mut self, node: NodeId, name: impl Into<String>) -> Result<(), GraphError> {
        self.node_mut(node)?.set_name(name);
        Ok(())
    }

    /// Rewrite every use of `from` to read `to` instead.
    ///
    /// Returns the number of rewritten slots. Afterwards `from` has no uses.
    /// `to` may be null, which disconnects the consumers.
    pub fn replace_all_uses_of_with(
        &mut self,
        from: NodeValue,
        to: NodeValue,
    ) -> Result<usize, GraphError> {
        let Some(producer) = from.node() else {
            return Ok(0);
        };
        let tokens = self.node_ref(producer)?.users().tokens_for(Some(from.resno()));
        self.check_target(producer, to)?;
        if from == to {
            return Ok(0);
        }

        let rewritten = self.retarget(producer, &tokens, |_| to);
        debug!(%from, %to, rewritten, "replaced all uses");
        Ok(rewritten)
    }

    /// Rewrite every use of any result `i` of `old` to read result `i` of
    /// `new`.
    ///
    /// # Panics
    ///
    /// Panics if a used result of `old` has no counterpart in `new`.
    pub fn replace_all_node_uses_with(
        &mut self,
        old: NodeId,
        new: NodeId,
    ) -> Result<usize, GraphError> {
        let tokens = self.node_ref(old)?.users().tokens_for(None);
        let new_results = self.node_ref(new)?.num_results();
        if old == new {
            return Ok(0);
        }

        let rewritten = self.retarget(old, &tokens, |resno| {
            assert!(
                (resno as usize) < new_results,
                "{} has no result {} to take over uses of {}",
                new,
                resno,
                old
            );
            NodeValue::new(new, resno)
        });
        debug!(%old, %new, rewritten, "replaced all node uses");
        Ok(rewritten)
    }

    /// Reset every use of every result of `node` to null.
    ///
    /// Afterwards no slot anywhere refers to `node`, so it can be destroyed.
    pub fn release_users(&mut self, node: NodeId) -> Result<usize, GraphError> {
        let tokens = self.node_ref(node)?.users().tokens_for(None);
        Ok(self.retarget(node, &tokens, |_| NodeValue::null()))
    }

    /// Disconnect every operand slot of `node`, removing its records from
    /// its producers' use lists.
    pub fn drop_operands(&mut self, node: NodeId) -> Result<(), GraphError> {
        let slots: Vec<OperandSlot> = self.node_ref(node)?.slots().collect();
        for slot in slots {
            self.set_slot(node, slot, NodeValue::null());
        }
        Ok(())
    }

    /// Remove `node` from `function` and destroy it.
    ///
    /// Its operands are detached first, then every remaining user is reset
    /// to null, so nodes can be erased in any order.
    pub fn erase_node(&mut self, function: FunctionId, node: NodeId) -> Result<(), GraphError> {
        if !self.function_ref(function)?.contains(node) {
            return Err(GraphError::NotOwned { node, function });
        }
        self.drop_operands(node)?;
        let released = self.release_users(node)?;

        if let Some(owner) = self.functions.get_mut(&function) {
            owner.list_mut().remove(node);
        }
        self.nodes.remove(&node);
        debug!(%node, %function, released, "erased node");
        Ok(())
    }

    /// Move the nodes `first..=last` of `from` into `to`, placed before
    /// `before` or at the end.
    ///
    /// Moved nodes keep their IDs, operands, results and use lists; only
    /// their parent changes. Returns the number of moved nodes.
    pub fn transfer_nodes(
        &mut self,
        from: FunctionId,
        first: NodeId,
        last: NodeId,
        to: FunctionId,
        before: Option<NodeId>,
    ) -> Result<usize, GraphError> {
        let source = self.function_ref(from)?;
        let target = self.function_ref(to)?;
        for node in [first, last] {
            if !source.contains(node) {
                return Err(GraphError::NotOwned {
                    node,
                    function: from,
                });
            }
        }
        let invalid = GraphError::InvalidRange {
            function: from,
            first,
            last,
        };
        let range = source.list().range(first, last).ok_or_else(|| invalid.clone())?;
        if let Some(before) = before {
            if !target.contains(before) {
                return Err(GraphError::NotOwned {
                    node: before,
                    function: to,
                });
            }
            if from == to && range.contains(&before) {
                return Err(invalid);
            }
        }

        if let Some(source) = self.functions.get_mut(&from) {
            for node in &range {
                source.list_mut().remove(*node);
            }
        }
        if let Some(target) = self.functions.get_mut(&to) {
            for node in &range {
                target.list_mut().insert(*node, before);
            }
        }
        for node in &range {
            if let Some(node) = self.nodes.get_mut(node) {
                node.set_parent(Some(to));
            }
        }
        debug!(%from, %to, moved = range.len(), "transferred nodes");
        Ok(range.len())
    }

    /// Uses of one result, filtered from its node's combined use list.
    ///
    /// Yields nothing for null values and nodes not stored here.
    pub fn uses_of(&self, value: NodeValue) -> UsesOf<'_> {
        match value.node().and_then(|node| self.nodes.get(&node)) {
            Some(node) => node.users().uses_of(value),
            None => UsesOf::empty(),
        }
    }

    /// Every use of every result of `node`.
    pub fn users_of(&self, node: NodeId) -> impl Iterator<Item = &NodeUse> {
        self.nodes
            .get(&node)
            .into_iter()
            .flat_map(|node| node.users().iter())
    }

    pub fn num_uses(&self, value: NodeValue) -> usize {
        self.uses_of(value).count()
    }

    pub fn has_one_use(&self, value: NodeValue) -> bool {
        let mut uses = self.uses_of(value);
        uses.next().is_some() && uses.next().is_none()
    }

    /// Type of the result named by `value`, if stored and assigned.
    pub fn value_type(&self, value: NodeValue) -> Option<&TypeRef> {
        value.ty(self)
    }

    pub(crate) fn function_ref(&self, id: FunctionId) -> Result<&Function, GraphError> {
        self.functions
            .get(&id)
            .ok_or(GraphError::UnknownFunction { function: id })
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::UnknownNode { node: id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes
            .get_mut(&id)
            .ok_or(GraphError::UnknownNode { node: id })
    }

    fn attach(
        &mut self,
        function: FunctionId,
        mut node: Node,
        before: Option<NodeId>,
    ) -> Result<NodeId, GraphError> {
        let owner = self.function_ref(function)?;
        if let Some(parent) = node.parent() {
            return Err(GraphError::AlreadyAttached {
                node: node.id(),
                function: parent,
            });
        }
        if let Some(before) = before {
            if !owner.contains(before) {
                return Err(GraphError::NotOwned {
                    node: before,
                    function,
                });
            }
        }
        let id = node.id();
        let operands: Vec<(OperandSlot, NodeValue)> = node.operands().collect();
        for (_, value) in &operands {
            self.check_target(id, *value)?;
        }

        for (slot, value) in operands {
            node.slot_mut(slot).token = self.register_use(id, slot, value);
        }
        node.set_parent(Some(function));
        debug!(node = %id, %function, kind = %node.kind(), name = node.name(), "attached node");
        self.nodes.insert(id, node);
        if let Some(owner) = self.functions.get_mut(&function) {
            owner.list_mut().insert(id, before);
        }
        Ok(id)
    }

    fn check_target(&self, user: NodeId, value: NodeValue) -> Result<(), GraphError> {
        match value.node() {
            Some(target) if !self.nodes.contains_key(&target) => {
                Err(GraphError::DanglingOperand { node: user, value })
            }
            _ => Ok(()),
        }
    }

    /// Retarget the slots recorded at `tokens` in `producer`'s use list to
    /// `to(resno)`. The tokens are a snapshot taken by the caller.
    fn retarget(
        &mut self,
        producer: NodeId,
        tokens: &[UseToken],
        mut to: impl FnMut(u32) -> NodeValue,
    ) -> usize {
        let mut rewritten = 0;
        for token in tokens {
            let Some(record) = self
                .nodes
                .get(&producer)
                .and_then(|node| node.users().get(*token))
                .copied()
            else {
                continue;
            };
            debug_assert_eq!(
                self.nodes
                    .get(&record.user())
                    .map(|user| user.slot(record.slot()).value),
                Some(record.value()),
                "slot {:?} of {} no longer holds the recorded value",
                record.slot(),
                record.user()
            );
            self.set_slot(record.user(), record.slot(), to(record.value().resno()));
            rewritten += 1;
        }
        rewritten
    }

    /// The paired slot/use-list update. Callers have checked that `value`
    /// refers to a stored node.
    fn set_slot(&mut self, user: NodeId, slot: OperandSlot, value: NodeValue) {
        let Some(old) = self.nodes.get(&user).map(|node| *node.slot(slot)) else {
            return;
        };
        if old.value == value {
            return;
        }

        if let (Some(token), Some(producer)) = (old.token, old.value.node()) {
            if let Some(producer) = self.nodes.get_mut(&producer) {
                let removed = producer.users_mut().remove_use(token);
                debug_assert!(
                    removed.is_some_and(|u| u.user() == user && u.slot() == slot),
                    "use record of {} {:?} was missing or mismatched",
                    user,
                    slot
                );
            }
        }
        let token = self.register_use(user, slot, value);
        if let Some(node) = self.nodes.get_mut(&user) {
            *node.slot_mut(slot) = Operand { value, token };
        }
        trace!(%user, ?slot, from = %old.value, to = %value, "retargeted operand");
    }

    fn register_use(&mut self, user: NodeId, slot: OperandSlot, value: NodeValue) -> Option<UseToken> {
        let producer = self.nodes.get_mut(&value.node()?)?;
        Some(producer.users_mut().add_use(user, slot, value))
    }
}
