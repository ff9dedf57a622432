//! Error types.
//!
//! Two tiers exist. [`GraphError`] is returned by owner operations that are
//! handed an identity that does not resolve. [`VerifyError`] describes a
//! malformed graph; it is produced by verification and never raised as a
//! panic. Broken caller contracts (too many results, out-of-range indices)
//! panic instead of returning either.

use thiserror::Error;

use crate::graph::{FunctionId, NodeId, NodeKind, NodeValue};

/// Failures of owner-level operations on a [`Module`](crate::graph::Module).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {node} does not exist in this module")]
    UnknownNode { node: NodeId },

    #[error("function {function} does not exist in this module")]
    UnknownFunction { function: FunctionId },

    #[error("node {node} is not owned by function {function}")]
    NotOwned { node: NodeId, function: FunctionId },

    #[error("node {node} is already attached to function {function}")]
    AlreadyAttached { node: NodeId, function: FunctionId },

    #[error("operand {value} of node {node} refers to a node outside this module")]
    DanglingOperand { node: NodeId, value: NodeValue },

    #[error("range {first}..={last} is not a contiguous forward range of function {function}")]
    InvalidRange {
        function: FunctionId,
        first: NodeId,
        last: NodeId,
    },
}

/// A semantic validation failure reported by verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("node {node}: result {resno} has no type")]
    MissingResultType { node: NodeId, resno: u32 },

    #[error("node {node} ({kind}): expected {expected} results, found {found}")]
    ResultCountMismatch {
        node: NodeId,
        kind: NodeKind,
        expected: usize,
        found: usize,
    },

    #[error("node {node} ({kind}): expected {expected} inputs, found {found}")]
    ArityMismatch {
        node: NodeId,
        kind: NodeKind,
        expected: String,
        found: usize,
    },

    #[error("node {node}: input {input} ({name}) is not connected")]
    NullOperand {
        node: NodeId,
        input: usize,
        name: String,
    },

    #[error("node {node}: input {input} refers to missing node {target}")]
    DanglingOperand {
        node: NodeId,
        input: usize,
        target: NodeId,
    },

    #[error("node {node}: input {input} refers to {value}, which has no such result")]
    OperandOutOfRange {
        node: NodeId,
        input: usize,
        value: NodeValue,
    },

    #[error("node {node}: predicate {value} is invalid: {reason}")]
    BadPredicate {
        node: NodeId,
        value: NodeValue,
        reason: String,
    },

    #[error("node {node} ({kind}): {message}")]
    KindRule {
        node: NodeId,
        kind: NodeKind,
        message: String,
    },

    #[error("use-def link broken between user {user} and {value}: {reason}")]
    BrokenLink {
        user: NodeId,
        value: NodeValue,
        reason: String,
    },

    #[error("node {node} is part of an operand cycle")]
    Cycle { node: NodeId },

    #[error("node {node} claims parent {claimed:?} but is listed by {function}")]
    ParentMismatch {
        node: NodeId,
        claimed: Option<FunctionId>,
        function: FunctionId,
    },
}
