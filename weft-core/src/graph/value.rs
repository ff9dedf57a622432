//! Node Values
//!
//! A [`NodeValue`] names one result of one node: the endpoint of a dataflow
//! edge. It is a plain identity pair and owns nothing; the node it names is
//! resolved through the [`Module`] that stores it.

use std::fmt;

use super::module::Module;
use super::node::NodeId;
use crate::types::TypeRef;

/// Reference to result `resno` of a node, or the null reference.
///
/// Equality and hashing both cover the `(node, resno)` pair. The null value
/// always has result number zero, so it equals only other nulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeValue {
    node: Option<NodeId>,
    resno: u32,
}

impl NodeValue {
    /// Reference result `resno` of `node`.
    pub fn new(node: NodeId, resno: u32) -> Self {
        Self {
            node: Some(node),
            resno,
        }
    }

    /// The null reference. Operand slots hold this when disconnected.
    pub const fn null() -> Self {
        Self {
            node: None,
            resno: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.node.is_none()
    }

    /// Get the referenced node, or `None` for the null reference.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Get the result number.
    pub fn resno(&self) -> u32 {
        self.resno
    }

    /// Get the type of the referenced result.
    ///
    /// Returns `None` for the null reference, for a node that is not stored
    /// in `module`, and for a result whose type has not been assigned yet.
    ///
    /// # Panics
    ///
    /// Panics if the node exists but has no result `resno`.
    pub fn ty<'m>(&self, module: &'m Module) -> Option<&'m TypeRef> {
        let node = module.node(self.node?)?;
        node.result_type(self.resno as usize)
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "{}:{}", node, self.resno),
            None => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn null_equals_only_null() {
        let node = NodeId::new();
        assert_eq!(NodeValue::null(), NodeValue::default());
        assert_ne!(NodeValue::null(), NodeValue::new(node, 0));
        assert!(NodeValue::null().is_null());
        assert!(!NodeValue::new(node, 0).is_null());
    }

    #[test]
    fn equality_covers_node_and_resno() {
        let a = NodeId::new();
        let b = NodeId::new();
        assert_eq!(NodeValue::new(a, 1), NodeValue::new(a, 1));
        assert_ne!(NodeValue::new(a, 0), NodeValue::new(a, 1));
        assert_ne!(NodeValue::new(a, 0), NodeValue::new(b, 0));

        let set: HashSet<_> = [NodeValue::new(a, 0), NodeValue::new(a, 0), NodeValue::new(a, 1)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn null_has_no_type() {
        let module = Module::new();
        assert!(NodeValue::null().ty(&module).is_none());
        assert!(NodeValue::new(NodeId::new(), 0).ty(&module).is_none());
    }
}
