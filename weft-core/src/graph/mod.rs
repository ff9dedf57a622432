//! Dataflow Graph
//!
//! This module implements the node/edge substrate of the Weft IR.
//!
//! # Overview
//!
//! - A [`Node`] performs one operation and produces up to
//!   [`MAX_NODE_RESULTS`] typed results.
//! - A [`NodeValue`] names one result of one node. Operands and predicates
//!   are `NodeValue`s, so edges are references, never ownership.
//! - Every node keeps a [`UseList`] recording which operand slots of which
//!   nodes read its results. [`Module::uses_of`] narrows it to one result.
//! - A [`Function`] owns an ordered list of nodes. The [`Module`] stores the
//!   nodes of all its functions and performs every structural edit.
//!
//! # Design Decisions
//!
//! 1. Nodes are stored centrally and referenced by ID. A node moved from one
//!    function to another keeps its ID, so no operand or use record has to
//!    be rewritten by the move.
//!
//! 2. Each operand slot keeps a token for its use record. Retargeting a slot
//!    removes the old record and adds the new one in O(1).
//!
//! 3. Rewrites that walk a use list snapshot the matching tokens first and
//!    then edit. Read-only iterators borrow the module, so the compiler
//!    rejects edits while they are alive.

mod function;
mod kind;
mod list;
mod module;
mod node;
mod use_def;
mod value;
mod verify;
mod walker;

pub use function::{Function, FunctionId};
pub use kind::{KindInfo, NodeKind};
pub use module::Module;
pub use node::{Node, NodeId, StructuralKey, MAX_NODE_RESULTS};
pub use use_def::{NodeUse, OperandSlot, UseList, UseToken, UsesOf};
pub use value::NodeValue;
pub use walker::{NodeWalker, PostOrder};
