//! Graph Nodes
//!
//! This module defines the node type that lives in the dataflow graph.
//!
//! A node has a kind, a name, up to [`MAX_NODE_RESULTS`] typed results, a
//! list of operand slots and an optional predicate slot. Operands and the
//! predicate are [`NodeValue`]s: identity references into the owning
//! [`Module`](super::Module), never ownership.
//!
//! A freshly built node is *unattached*: a plain value that no module knows
//! about. Its slots can be filled freely and no use records exist for them.
//! Once it is handed to [`Module::add_node`](super::Module::add_node) every
//! further edit of its slots goes through the module so the producer's use
//! list stays in step.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::function::FunctionId;
use super::kind::NodeKind;
use super::use_def::{Operand, OperandSlot, UseList};
use super::value::NodeValue;
use crate::types::{ElemKind, TypeRef};

/// Maximum number of results a node may have.
pub const MAX_NODE_RESULTS: usize = 6;

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A node in the dataflow graph.
#[derive(Debug)]
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,

    /// What operation this node performs.
    kind: NodeKind,

    /// Human-readable name. Not required to be unique.
    name: String,

    /// Result types; entries at `num_results..` are always `None`.
    types: [Option<TypeRef>; MAX_NODE_RESULTS],

    /// How many results are populated.
    num_results: usize,

    inputs: SmallVec<[Operand; 4]>,

    /// Null when the node is unconditional.
    predicate: Operand,

    /// Function that owns this node, if attached.
    parent: Option<FunctionId>,

    /// Every recorded use of every result of this node.
    users: UseList,
}

impl Node {
    /// Create a new unattached node with no results and no inputs.
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            name: name.into(),
            types: Default::default(),
            num_results: 0,
            inputs: SmallVec::new(),
            predicate: Operand::default(),
            parent: None,
            users: UseList::new(),
        }
    }

    /// Append a result of type `ty`.
    pub fn with_result(mut self, ty: TypeRef) -> Self {
        self.add_result(ty);
        self
    }

    /// Append an input reading `value`.
    pub fn with_input(mut self, value: NodeValue) -> Self {
        self.push_input(value);
        self
    }

    /// Guard the node with `value`.
    pub fn with_predicate(mut self, value: NodeValue) -> Self {
        self.assert_unattached();
        self.predicate = Operand::detached(value);
        self
    }

    /// Append a result of type `ty`.
    ///
    /// # Panics
    ///
    /// Panics if the node already has [`MAX_NODE_RESULTS`] results.
    pub fn add_result(&mut self, ty: TypeRef) {
        let idx = self.reserve_result();
        self.types[idx] = Some(ty);
    }

    /// Append a result whose type will be assigned later with `set_type`.
    ///
    /// Verification fails until the type is set.
    ///
    /// # Panics
    ///
    /// Panics if the node already has [`MAX_NODE_RESULTS`] results.
    pub fn add_untyped_result(&mut self) {
        self.reserve_result();
    }

    /// Append an input. Only valid on an unattached node.
    pub fn push_input(&mut self, value: NodeValue) {
        self.assert_unattached();
        self.inputs.push(Operand::detached(value));
    }

    /// Point input `idx` at `value`. Only valid on an unattached node;
    /// attached nodes use [`Module::set_nth_input`](super::Module::set_nth_input).
    pub fn set_nth_input(&mut self, idx: usize, value: NodeValue) {
        self.assert_unattached();
        self.inputs[idx] = Operand::detached(value);
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get the function holding this node, or `None` if unattached.
    pub fn parent(&self) -> Option<FunctionId> {
        self.parent
    }

    pub fn num_results(&self) -> usize {
        self.num_results
    }

    /// Get a reference to result `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not a populated result.
    pub fn nth_result(&self, idx: usize) -> NodeValue {
        assert!(
            idx < self.num_results,
            "{} has {} results, asked for {}",
            self.id,
            self.num_results,
            idx
        );
        NodeValue::new(self.id, idx as u32)
    }

    /// References to every result, in order.
    pub fn results(&self) -> impl Iterator<Item = NodeValue> + '_ {
        (0..self.num_results).map(|idx| NodeValue::new(self.id, idx as u32))
    }

    /// Get the type of result `idx`, or `None` if not assigned yet.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not a populated result.
    pub fn result_type(&self, idx: usize) -> Option<&TypeRef> {
        assert!(
            idx < self.num_results,
            "{} has {} results, asked for the type of {}",
            self.id,
            self.num_results,
            idx
        );
        self.types[idx].as_ref()
    }

    /// Set the type of result `idx`.
    ///
    /// Only this result changes. Consumers are not re-checked; keeping them
    /// consistent is the caller's job.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not a populated result.
    pub fn set_type(&mut self, idx: usize, ty: TypeRef) {
        assert!(
            idx < self.num_results,
            "{} has {} results, cannot type result {}",
            self.id,
            self.num_results,
            idx
        );
        self.types[idx] = Some(ty);
    }

    /// Element kind of result `resno`.
    pub fn element_type(&self, resno: usize) -> Option<ElemKind> {
        self.result_type(resno).map(|ty| ty.elem_kind())
    }

    /// Dimensions of result `resno`.
    pub fn dims(&self, resno: usize) -> Option<&[usize]> {
        self.result_type(resno).map(|ty| ty.dims())
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Get the value read by input `idx`.
    pub fn nth_input(&self, idx: usize) -> NodeValue {
        self.inputs[idx].value
    }

    /// Values read by every input, in order.
    pub fn inputs(&self) -> impl Iterator<Item = NodeValue> + '_ {
        self.inputs.iter().map(|operand| operand.value)
    }

    pub fn input_name(&self, idx: usize) -> String {
        self.kind.input_name(idx)
    }

    pub fn output_name(&self, idx: usize) -> &'static str {
        self.kind.output_name(idx)
    }

    pub fn has_side_effects(&self) -> bool {
        self.kind.info().side_effects
    }

    pub fn is_arithmetic(&self) -> bool {
        self.kind.info().arithmetic
    }

    /// Check if input `idx` is written to by this node.
    pub fn is_overwritten_nth_input(&self, idx: usize) -> bool {
        self.kind.info().overwritten.contains(&idx)
    }

    /// Get the predicate; null when the node is unconditional.
    pub fn predicate(&self) -> NodeValue {
        self.predicate.value
    }

    pub fn has_predicate(&self) -> bool {
        !self.predicate.value.is_null()
    }

    /// Every recorded use of every result of this node.
    pub fn users(&self) -> &UseList {
        &self.users
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// Non-null operands (predicate first, then inputs) with their slots.
    pub fn operands(&self) -> impl Iterator<Item = (OperandSlot, NodeValue)> + '_ {
        let predicate = std::iter::once((OperandSlot::Predicate, self.predicate.value));
        let inputs = self
            .inputs
            .iter()
            .enumerate()
            .map(|(idx, operand)| (OperandSlot::Input(idx as u32), operand.value));
        predicate
            .chain(inputs)
            .filter(|(_, value)| !value.is_null())
    }

    /// Copy this node into a new unattached node with a fresh ID.
    ///
    /// Kind, name, result types, inputs and predicate are copied. The copy
    /// has no users and belongs to no function; insert it with
    /// [`Module::add_node`](super::Module::add_node).
    pub fn clone_node(&self) -> Node {
        Node {
            id: NodeId::new(),
            kind: self.kind,
            name: self.name.clone(),
            types: self.types.clone(),
            num_results: self.num_results,
            inputs: self
                .inputs
                .iter()
                .map(|operand| Operand::detached(operand.value))
                .collect(),
            predicate: Operand::detached(self.predicate.value),
            parent: None,
            users: UseList::new(),
        }
    }

    /// Structural equality: kind, result types, inputs and predicate.
    ///
    /// Names and IDs are ignored. Inputs compare by the referenced
    /// `(node, result)` pair, not by the referenced node's contents.
    pub fn is_equal(&self, other: &Node) -> bool {
        self.kind == other.kind
            && self.num_results == other.num_results
            && self.types == other.types
            && self.predicate.value == other.predicate.value
            && self.inputs.len() == other.inputs.len()
            && self.inputs().eq(other.inputs())
    }

    /// Hash over exactly the fields [`Node::is_equal`] compares.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.structural_key().hash(&mut hasher);
        hasher.finish()
    }

    /// A `Hash + Eq` view of this node keyed on its structure, for
    /// deduplication maps.
    pub fn structural_key(&self) -> StructuralKey<'_> {
        StructuralKey(self)
    }

    pub(crate) fn slot(&self, slot: OperandSlot) -> &Operand {
        match slot {
            OperandSlot::Input(idx) => &self.inputs[idx as usize],
            OperandSlot::Predicate => &self.predicate,
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: OperandSlot) -> &mut Operand {
        match slot {
            OperandSlot::Input(idx) => &mut self.inputs[idx as usize],
            OperandSlot::Predicate => &mut self.predicate,
        }
    }

    /// All operand slots, including empty ones.
    pub(crate) fn slots(&self) -> impl Iterator<Item = OperandSlot> {
        std::iter::once(OperandSlot::Predicate)
            .chain((0..self.inputs.len() as u32).map(OperandSlot::Input))
    }

    pub(crate) fn users_mut(&mut self) -> &mut UseList {
        &mut self.users
    }

    pub(crate) fn set_parent(&mut self, parent: Option<FunctionId>) {
        self.parent = parent;
    }

    fn reserve_result(&mut self) -> usize {
        assert!(
            self.num_results < MAX_NODE_RESULTS,
            "{} ({}) cannot have more than {} results",
            self.id,
            self.kind,
            MAX_NODE_RESULTS
        );
        self.num_results += 1;
        self.num_results - 1
    }

    fn assert_unattached(&self) {
        assert!(
            self.parent.is_none(),
            "{} is attached; edit its operands through the module",
            self.id
        );
    }
}

/// Structural identity of a [`Node`], see [`Node::structural_key`].
#[derive(Debug, Clone, Copy)]
pub struct StructuralKey<'a>(&'a Node);

impl PartialEq for StructuralKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.is_equal(other.0)
    }
}

impl Eq for StructuralKey<'_> {}

impl Hash for StructuralKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let node = self.0;
        node.kind.hash(state);
        node.num_results.hash(state);
        node.types.hash(state);
        node.predicate.value.hash(state);
        node.inputs.len().hash(state);
        for value in node.inputs() {
            value.hash(state);
        }
    }
}
