//! Verification
//!
//! Semantic checks over attached nodes. Failures are returned as
//! [`VerifyError`] values and logged at `warn`; nothing here panics on a
//! malformed graph.
//!
//! Node checks:
//!
//! - every populated result has a type, and the result count matches the kind
//! - the input count is an arity the kind accepts
//! - every input is connected and names an existing result
//! - the predicate, if set, names an existing boolean result
//! - the kind's own structural rules hold
//! - every operand slot and the matching use record agree, in both directions
//!
//! Function checks add parent links and operand cycles.

use std::collections::HashMap;

use indexmap::IndexSet;
use tracing::warn;

use super::function::FunctionId;
use super::kind::{check_kind_rules, KindCheck};
use super::module::Module;
use super::node::{Node, NodeId};
use super::use_def::OperandSlot;
use super::value::NodeValue;
use crate::error::{GraphError, VerifyError};
use crate::types::{ElemKind, TypeRef};

impl Module {
    /// Check whether `node` is well formed. Unknown nodes are not.
    pub fn verify_node(&self, node: NodeId) -> bool {
        self.diagnose_node(node)
            .map_or(false, |errors| errors.is_empty())
    }

    /// Every validation failure of `node`.
    pub fn diagnose_node(&self, node: NodeId) -> Result<Vec<VerifyError>, GraphError> {
        let node = self.node_ref(node)?;
        let mut errors = Vec::new();
        self.check_node(node, &mut errors);
        report(&errors);
        Ok(errors)
    }

    /// Check whether every node of `function` is well formed and the
    /// function is free of operand cycles.
    pub fn verify_function(&self, function: FunctionId) -> bool {
        self.diagnose_function(function)
            .map_or(false, |errors| errors.is_empty())
    }

    /// Every validation failure of `function`, in list order.
    pub fn diagnose_function(&self, function: FunctionId) -> Result<Vec<VerifyError>, GraphError> {
        let owner = self.function_ref(function)?;
        let mut errors = Vec::new();
        for id in owner.nodes() {
            let Some(node) = self.node(id) else {
                errors.push(VerifyError::ParentMismatch {
                    node: id,
                    claimed: None,
                    function,
                });
                continue;
            };
            if node.parent() != Some(function) {
                errors.push(VerifyError::ParentMismatch {
                    node: id,
                    claimed: node.parent(),
                    function,
                });
            }
            self.check_node(node, &mut errors);
        }
        for node in self.find_cycles(owner.nodes()) {
            errors.push(VerifyError::Cycle { node });
        }
        report(&errors);
        Ok(errors)
    }

    fn check_node(&self, node: &Node, errors: &mut Vec<VerifyError>) {
        let id = node.id();
        let kind = node.kind();
        let info = kind.info();

        let results: Vec<Option<&TypeRef>> =
            (0..node.num_results()).map(|idx| node.result_type(idx)).collect();
        for (resno, ty) in results.iter().enumerate() {
            if ty.is_none() {
                errors.push(VerifyError::MissingResultType {
                    node: id,
                    resno: resno as u32,
                });
            }
        }
        if info.results.len() != node.num_results() {
            errors.push(VerifyError::ResultCountMismatch {
                node: id,
                kind,
                expected: info.results.len(),
                found: node.num_results(),
            });
        }

        let arity_ok = kind.accepts_inputs(node.num_inputs());
        if !arity_ok {
            errors.push(VerifyError::ArityMismatch {
                node: id,
                kind,
                expected: kind.arity_description(),
                found: node.num_inputs(),
            });
        }

        let mut inputs = Vec::with_capacity(node.num_inputs());
        for (idx, value) in node.inputs().enumerate() {
            inputs.push(self.check_input(node, idx, value, arity_ok, errors));
        }

        if node.has_predicate() {
            self.check_predicate(node, errors);
        }

        let check = KindCheck {
            inputs: &inputs,
            results: &results,
        };
        for message in check_kind_rules(kind, &check) {
            errors.push(VerifyError::KindRule {
                node: id,
                kind,
                message,
            });
        }

        self.check_links(node, errors);
    }

    /// Check one input, returning the type it reads if it resolves.
    fn check_input(
        &self,
        node: &Node,
        idx: usize,
        value: NodeValue,
        named: bool,
        errors: &mut Vec<VerifyError>,
    ) -> Option<&TypeRef> {
        let id = node.id();
        let Some(target) = value.node() else {
            let name = if named {
                node.input_name(idx)
            } else {
                format!("#{}", idx)
            };
            errors.push(VerifyError::NullOperand {
                node: id,
                input: idx,
                name,
            });
            return None;
        };
        let Some(producer) = self.node(target) else {
            errors.push(VerifyError::DanglingOperand {
                node: id,
                input: idx,
                target,
            });
            return None;
        };
        if value.resno() as usize >= producer.num_results() {
            errors.push(VerifyError::OperandOutOfRange {
                node: id,
                input: idx,
                value,
            });
            return None;
        }
        producer.result_type(value.resno() as usize)
    }

    fn check_predicate(&self, node: &Node, errors: &mut Vec<VerifyError>) {
        let value = node.predicate();
        let reason = match value.node().and_then(|target| self.node(target)) {
            None => Some("refers to a missing node".to_string()),
            Some(producer) if value.resno() as usize >= producer.num_results() => {
                Some("refers to a missing result".to_string())
            }
            Some(producer) => match producer.result_type(value.resno() as usize) {
                Some(ty) if ty.elem_kind() != ElemKind::Bool => {
                    Some(format!("must be boolean, found {}", ty))
                }
                _ => None,
            },
        };
        if let Some(reason) = reason {
            errors.push(VerifyError::BadPredicate {
                node: node.id(),
                value,
                reason,
            });
        }
    }

    /// Check that each operand slot has a matching record in its producer's
    /// use list, and that each record in this node's list is backed by the
    /// slot it names.
    fn check_links(&self, node: &Node, errors: &mut Vec<VerifyError>) {
        let id = node.id();
        for (slot, value) in node.operands() {
            let Some(producer) = value.node().and_then(|target| self.node(target)) else {
                continue;
            };
            let record = node
                .slot(slot)
                .token
                .and_then(|token| producer.users().get(token));
            let reason = match record {
                None => Some(format!("{:?} has no use record", slot)),
                Some(record) if record.user() != id || record.slot() != slot => Some(format!(
                    "{:?} points at the record of {} {:?}",
                    slot,
                    record.user(),
                    record.slot()
                )),
                Some(record) if record.value() != value => Some(format!(
                    "{:?} reads {} but its record says {}",
                    slot,
                    value,
                    record.value()
                )),
                Some(_) => None,
            };
            if let Some(reason) = reason {
                errors.push(VerifyError::BrokenLink {
                    user: id,
                    value,
                    reason,
                });
            }
        }

        for (token, record) in node.users().entries() {
            let reason = match self.node(record.user()) {
                None => Some("user does not exist".to_string()),
                Some(user) if !slot_exists(user, record.slot()) => {
                    Some(format!("user has no {:?}", record.slot()))
                }
                Some(user) => {
                    let operand = user.slot(record.slot());
                    if operand.value != record.value() {
                        Some(format!("{:?} of the user reads {}", record.slot(), operand.value))
                    } else if operand.token != Some(token) {
                        Some(format!("{:?} of the user holds another record", record.slot()))
                    } else {
                        None
                    }
                }
            };
            if let Some(reason) = reason {
                errors.push(VerifyError::BrokenLink {
                    user: record.user(),
                    value: record.value(),
                    reason,
                });
            }
        }
    }

    /// Nodes closing an operand cycle reachable from `roots`.
    fn find_cycles(&self, roots: impl Iterator<Item = NodeId>) -> IndexSet<NodeId> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Active,
            Done,
        }

        let mut marks: HashMap<NodeId, Mark> = HashMap::new();
        let mut cyclic = IndexSet::new();
        for root in roots {
            if marks.contains_key(&root) {
                continue;
            }
            marks.insert(root, Mark::Active);
            let mut stack = vec![(root, 0usize)];

            while let Some(&(id, cursor)) = stack.last() {
                let next = self
                    .node(id)
                    .and_then(|node| node.operands().nth(cursor))
                    .map(|(_, value)| value.node());
                let Some(target) = next else {
                    marks.insert(id, Mark::Done);
                    stack.pop();
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let Some(target) = target.filter(|target| self.contains_node(*target)) else {
                    continue;
                };
                match marks.get(&target) {
                    Some(Mark::Active) => {
                        cyclic.insert(target);
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(target, Mark::Active);
                        stack.push((target, 0));
                    }
                }
            }
        }
        cyclic
    }
}

fn slot_exists(node: &Node, slot: OperandSlot) -> bool {
    match slot {
        OperandSlot::Input(idx) => (idx as usize) < node.num_inputs(),
        OperandSlot::Predicate => true,
    }
}

fn report(errors: &[VerifyError]) {
    for error in errors {
        warn!(%error, "verification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use crate::types::Type;

    fn float() -> TypeRef {
        Type::shared(ElemKind::Float, &[4])
    }

    fn placeholder(module: &mut Module, f: FunctionId, ty: TypeRef) -> NodeId {
        module
            .add_node(f, Node::new(NodeKind::Placeholder, "p").with_result(ty))
            .unwrap()
    }

    #[test]
    fn well_formed_graph_verifies() {
        let mut module = Module::new();
        let f = module.create_function("main");
        let a = placeholder(&mut module, f, float());
        let b = placeholder(&mut module, f, float());
        let add = Node::new(NodeKind::Add, "add")
            .with_input(NodeValue::new(a, 0))
            .with_input(NodeValue::new(b, 0))
            .with_result(float());
        let add = module.add_node(f, add).unwrap();

        assert!(module.verify_node(add));
        assert!(module.verify_function(f));
    }

    #[test]
    fn missing_type_and_arity_are_reported() {
        let mut module = Module::new();
        let f = module.create_function("main");
        let a = placeholder(&mut module, f, float());
        let mut relu = Node::new(NodeKind::Relu, "relu")
            .with_input(NodeValue::new(a, 0))
            .with_input(NodeValue::new(a, 0));
        relu.add_untyped_result();
        let relu = module.add_node(f, relu).unwrap();

        let errors = module.diagnose_node(relu).unwrap();
        assert!(errors.contains(&VerifyError::MissingResultType { node: relu, resno: 0 }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, VerifyError::ArityMismatch { found: 2, .. })));
        assert!(!module.verify_node(relu));

        module.set_type(relu, 0, float()).unwrap();
        assert!(!module.verify_node(relu));
    }

    #[test]
    fn null_and_out_of_range_inputs() {
        let mut module = Module::new();
        let f = module.create_function("main");
        let a = placeholder(&mut module, f, float());
        let sub = Node::new(NodeKind::Sub, "sub")
            .with_input(NodeValue::new(a, 3))
            .with_input(NodeValue::null())
            .with_result(float());
        let sub = module.add_node(f, sub).unwrap();

        let errors = module.diagnose_node(sub).unwrap();
        assert_eq!(
            errors,
            vec![
                VerifyError::OperandOutOfRange {
                    node: sub,
                    input: 0,
                    value: NodeValue::new(a, 3),
                },
                VerifyError::NullOperand {
                    node: sub,
                    input: 1,
                    name: "RHS".to_string(),
                },
            ]
        );
    }

    #[test]
    fn predicate_must_be_boolean() {
        let mut module = Module::new();
        let f = module.create_function("main");
        let a = placeholder(&mut module, f, float());
        let relu = Node::new(NodeKind::Relu, "relu")
            .with_input(NodeValue::new(a, 0))
            .with_predicate(NodeValue::new(a, 0))
            .with_result(float());
        let relu = module.add_node(f, relu).unwrap();

        let errors = module.diagnose_node(relu).unwrap();
        assert!(matches!(
            errors.as_slice(),
            [VerifyError::BadPredicate { .. }]
        ));

        let cond = placeholder(&mut module, f, Type::shared(ElemKind::Bool, &[1]));
        module.set_predicate(relu, NodeValue::new(cond, 0)).unwrap();
        assert!(module.verify_node(relu));
    }

    #[test]
    fn kind_rules_are_reported() {
        let mut module = Module::new();
        let f = module.create_function("main");
        let lhs = placeholder(&mut module, f, Type::shared(ElemKind::Float, &[2, 3]));
        let rhs = placeholder(&mut module, f, Type::shared(ElemKind::Float, &[4, 5]));
        let mm = Node::new(NodeKind::MatMul, "mm")
            .with_input(NodeValue::new(lhs, 0))
            .with_input(NodeValue::new(rhs, 0))
            .with_result(Type::shared(ElemKind::Float, &[2, 5]));
        let mm = module.add_node(f, mm).unwrap();

        let errors = module.diagnose_node(mm).unwrap();
        assert!(matches!(
            errors.as_slice(),
            [VerifyError::KindRule { kind: NodeKind::MatMul, .. }]
        ));
    }

    #[test]
    fn cycles_are_reported() {
        let mut module = Module::new();
        let f = module.create_function("main");
        let a = placeholder(&mut module, f, float());
        let x = Node::new(NodeKind::Relu, "x")
            .with_input(NodeValue::new(a, 0))
            .with_result(float());
        let x = module.add_node(f, x).unwrap();
        let y = Node::new(NodeKind::Relu, "y")
            .with_input(NodeValue::new(x, 0))
            .with_result(float());
        let y = module.add_node(f, y).unwrap();
        assert!(module.verify_function(f));

        module.set_nth_input(x, 0, NodeValue::new(y, 0)).unwrap();
        let errors = module.diagnose_function(f).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], VerifyError::Cycle { .. }));
    }

    #[test]
    fn unknown_targets() {
        let module = Module::new();
        assert!(!module.verify_node(NodeId::new()));
        let missing = FunctionId::new();
        assert_eq!(
            module.diagnose_function(missing),
            Err(GraphError::UnknownFunction { function: missing })
        );
    }
}
