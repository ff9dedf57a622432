//! Graph Walkers
//!
//! Depth-first traversal over operand edges. [`Module::visit`] drives a
//! [`NodeWalker`] from a root node down through its predicate and inputs,
//! calling back before and after each node's operands are visited.
//!
//! The driver does not deduplicate: a node reachable along two paths is
//! offered to the walker twice, and the walker's `should_visit` decides
//! whether to descend again. [`PostOrder`] is the memoizing walker most
//! passes want.
//!
//! The traversal uses an explicit stack, so deep graphs do not overflow the
//! call stack. It assumes the graph has no operand cycles; memoizing walkers
//! terminate anyway because they refuse to re-enter a marked node.

use std::collections::HashSet;

use super::function::FunctionId;
use super::module::Module;
use super::node::{Node, NodeId};
use crate::error::GraphError;

/// Callbacks for [`Module::visit`].
///
/// `parent` is the node whose operand led to `node`, or `None` for the
/// root of the traversal.
pub trait NodeWalker {
    /// Return `false` to skip `node` and everything below it on this path.
    fn should_visit(&mut self, _parent: Option<&Node>, _node: &Node) -> bool {
        true
    }

    /// Called before the operands of `node` are visited.
    fn pre(&mut self, _parent: Option<&Node>, _node: &Node) {}

    /// Called after every operand of `node` has been visited.
    fn post(&mut self, _parent: Option<&Node>, _node: &Node) {}
}

enum Step {
    Enter { parent: Option<NodeId>, node: NodeId },
    Leave { parent: Option<NodeId>, node: NodeId },
}

impl Module {
    /// Walk the operand DAG below `root`.
    ///
    /// Operands are visited predicate first, then inputs in order. Null
    /// operands and operands naming nodes not stored here are skipped.
    pub fn visit<W: NodeWalker + ?Sized>(&self, root: NodeId, walker: &mut W) {
        let mut stack = vec![Step::Enter {
            parent: None,
            node: root,
        }];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter { parent, node } => {
                    let Some(current) = self.node(node) else {
                        continue;
                    };
                    let parent_node = parent.and_then(|id| self.node(id));
                    if !walker.should_visit(parent_node, current) {
                        continue;
                    }
                    walker.pre(parent_node, current);
                    stack.push(Step::Leave { parent, node });

                    let operands: Vec<NodeId> = current
                        .operands()
                        .filter_map(|(_, value)| value.node())
                        .collect();
                    for operand in operands.into_iter().rev() {
                        stack.push(Step::Enter {
                            parent: Some(node),
                            node: operand,
                        });
                    }
                }
                Step::Leave { parent, node } => {
                    if let Some(current) = self.node(node) {
                        walker.post(parent.and_then(|id| self.node(id)), current);
                    }
                }
            }
        }
    }

    /// Nodes reachable from `root`, operands before their users.
    pub fn post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut walker = PostOrder::new();
        self.visit(root, &mut walker);
        walker.into_order()
    }

    /// Every node of `function` in operand-before-user order.
    ///
    /// Ties are broken by the function's list order. Operands owned by
    /// other functions are not included.
    pub fn function_post_order(&self, function: FunctionId) -> Result<Vec<NodeId>, GraphError> {
        let mut walker = PostOrder::within(function);
        for node in self.function_ref(function)?.nodes() {
            self.visit(node, &mut walker);
        }
        Ok(walker.into_order())
    }
}

/// Memoizing post-order walker.
///
/// Each node is entered at most once; the order lists every entered node
/// after all of its operands.
#[derive(Debug, Default)]
pub struct PostOrder {
    visited: HashSet<NodeId>,
    order: Vec<NodeId>,
    scope: Option<FunctionId>,
}

impl PostOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A walker that only enters nodes owned by `function`.
    pub fn within(function: FunctionId) -> Self {
        Self {
            scope: Some(function),
            ..Self::default()
        }
    }

    /// Nodes in post order, so far.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn into_order(self) -> Vec<NodeId> {
        self.order
    }
}

impl NodeWalker for PostOrder {
    fn should_visit(&mut self, _parent: Option<&Node>, node: &Node) -> bool {
        if self.scope.is_some() && node.parent() != self.scope {
            return false;
        }
        !self.visited.contains(&node.id())
    }

    fn pre(&mut self, _parent: Option<&Node>, node: &Node) {
        self.visited.insert(node.id());
    }

    fn post(&mut self, _parent: Option<&Node>, node: &Node) {
        self.order.push(node.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, NodeValue};
    use crate::types::{ElemKind, Type, TypeRef};

    fn float() -> TypeRef {
        Type::shared(ElemKind::Float, &[2])
    }

    /// Records every callback as a string.
    #[derive(Default)]
    struct Trace {
        events: Vec<String>,
    }

    impl NodeWalker for Trace {
        fn pre(&mut self, parent: Option<&Node>, node: &Node) {
            let parent = parent.map_or("-", |p| p.name());
            self.events.push(format!("pre {} from {}", node.name(), parent));
        }

        fn post(&mut self, _parent: Option<&Node>, node: &Node) {
            self.events.push(format!("post {}", node.name()));
        }
    }

    /// `a` feeds both inputs of `add`, which is guarded by `cond`.
    fn diamond(module: &mut Module) -> (FunctionId, NodeId, NodeId) {
        let f = module.create_function("main");
        let a = module
            .add_node(f, Node::new(NodeKind::Placeholder, "a").with_result(float()))
            .unwrap();
        let cond = module
            .add_node(
                f,
                Node::new(NodeKind::Placeholder, "cond")
                    .with_result(Type::shared(ElemKind::Bool, &[1])),
            )
            .unwrap();
        let add = Node::new(NodeKind::Add, "add")
            .with_input(NodeValue::new(a, 0))
            .with_input(NodeValue::new(a, 0))
            .with_predicate(NodeValue::new(cond, 0))
            .with_result(float());
        let add = module.add_node(f, add).unwrap();
        (f, a, add)
    }

    #[test]
    fn visit_without_memoization_revisits_shared_operands() {
        let mut module = Module::new();
        let (_, _, add) = diamond(&mut module);

        let mut trace = Trace::default();
        module.visit(add, &mut trace);
        assert_eq!(
            trace.events,
            vec![
                "pre add from -",
                "pre cond from add",
                "post cond",
                "pre a from add",
                "post a",
                "pre a from add",
                "post a",
                "post add",
            ]
        );
    }

    #[test]
    fn should_visit_prunes_subtrees() {
        struct SkipSources(Vec<NodeId>);

        impl NodeWalker for SkipSources {
            fn should_visit(&mut self, _parent: Option<&Node>, node: &Node) -> bool {
                node.num_inputs() > 0
            }

            fn post(&mut self, _parent: Option<&Node>, node: &Node) {
                self.0.push(node.id());
            }
        }

        let mut module = Module::new();
        let (_, _, add) = diamond(&mut module);
        let mut walker = SkipSources(Vec::new());
        module.visit(add, &mut walker);
        assert_eq!(walker.0, vec![add]);
    }

    #[test]
    fn post_order_lists_operands_first_once() {
        let mut module = Module::new();
        let (f, a, add) = diamond(&mut module);

        let order = module.post_order(add);
        assert_eq!(order.len(), 3);
        assert_eq!(order.last(), Some(&add));
        assert_eq!(order.iter().filter(|id| **id == a).count(), 1);

        let whole = module.function_post_order(f).unwrap();
        assert_eq!(whole.len(), 3);
        assert_eq!(whole[0], a);
    }

    #[test]
    fn scoped_post_order_stays_in_function() {
        let mut module = Module::new();
        let (_, a, _) = diamond(&mut module);
        let g = module.create_function("other");
        let relu = Node::new(NodeKind::Relu, "relu")
            .with_input(NodeValue::new(a, 0))
            .with_result(float());
        let relu = module.add_node(g, relu).unwrap();

        assert_eq!(module.function_post_order(g).unwrap(), vec![relu]);
        assert_eq!(module.post_order(relu), vec![a, relu]);
    }
}
