//! Property Tests for Use-Def Symmetry
//!
//! Random sequences of operand edits and rewrites on a small graph. After
//! every step each connected slot must have exactly one use record, and each
//! use record must be backed by the slot it names.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use weft_core::graph::{FunctionId, Module, Node, NodeId, NodeKind, NodeValue, OperandSlot};
use weft_core::types::{ElemKind, Type};

const NODES: usize = 6;
const INPUTS: usize = 3;
const RESULTS: u32 = 2;

#[derive(Debug, Clone)]
enum Op {
    SetInput {
        user: usize,
        slot: usize,
        target: Option<(usize, u32)>,
    },
    SetPredicate {
        user: usize,
        target: Option<(usize, u32)>,
    },
    ReplaceUses {
        from: (usize, u32),
        to: Option<(usize, u32)>,
    },
    ReplaceNode {
        old: usize,
        new: usize,
    },
}

fn value() -> impl Strategy<Value = (usize, u32)> {
    (0..NODES, 0..RESULTS)
}

fn target() -> impl Strategy<Value = Option<(usize, u32)>> {
    proptest::option::of(value())
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..NODES, 0..INPUTS, target())
            .prop_map(|(user, slot, target)| Op::SetInput { user, slot, target }),
        1 => (0..NODES, target()).prop_map(|(user, target)| Op::SetPredicate { user, target }),
        2 => (value(), target()).prop_map(|(from, to)| Op::ReplaceUses { from, to }),
        1 => (0..NODES, 0..NODES).prop_map(|(old, new)| Op::ReplaceNode { old, new }),
    ]
}

/// Every node has `INPUTS` disconnected inputs and `RESULTS` results.
fn build() -> (Module, FunctionId, Vec<NodeId>) {
    let mut module = Module::new();
    let f = module.create_function("main");
    let ty = Type::shared(ElemKind::Float, &[4]);
    let ids = (0..NODES)
        .map(|i| {
            let mut node = Node::new(NodeKind::Concat, format!("n{}", i));
            for _ in 0..INPUTS {
                node.push_input(NodeValue::null());
            }
            for _ in 0..RESULTS {
                node.add_result(ty.clone());
            }
            module.add_node(f, node).unwrap()
        })
        .collect();
    (module, f, ids)
}

fn resolve(ids: &[NodeId], target: Option<(usize, u32)>) -> NodeValue {
    target.map_or(NodeValue::null(), |(node, resno)| NodeValue::new(ids[node], resno))
}

fn apply(module: &mut Module, ids: &[NodeId], op: &Op) {
    match *op {
        Op::SetInput { user, slot, target } => {
            module
                .set_nth_input(ids[user], slot, resolve(ids, target))
                .unwrap();
        }
        Op::SetPredicate { user, target } => {
            module.set_predicate(ids[user], resolve(ids, target)).unwrap();
        }
        Op::ReplaceUses { from, to } => {
            let from = resolve(ids, Some(from));
            let to = resolve(ids, to);
            module.replace_all_uses_of_with(from, to).unwrap();
            if from != to {
                assert_eq!(module.num_uses(from), 0);
            }
        }
        Op::ReplaceNode { old, new } => {
            module.replace_all_node_uses_with(ids[old], ids[new]).unwrap();
            if old != new {
                assert_eq!(module.node(ids[old]).unwrap().num_users(), 0);
            }
        }
    }
}

fn check_symmetry(module: &Module, ids: &[NodeId]) -> Result<(), TestCaseError> {
    let mut connected = 0;
    let mut records = 0;

    for &id in ids {
        let Some(node) = module.node(id) else {
            continue;
        };
        let slots = node
            .inputs()
            .enumerate()
            .map(|(idx, value)| (OperandSlot::Input(idx as u32), value))
            .chain(std::iter::once((OperandSlot::Predicate, node.predicate())));
        for (slot, value) in slots {
            if value.is_null() {
                continue;
            }
            connected += 1;
            let matching = module
                .uses_of(value)
                .filter(|u| u.user() == id && u.slot() == slot)
                .count();
            prop_assert_eq!(matching, 1, "{:?} of {} reading {}", slot, id, value);
        }

        for record in node.users().iter() {
            records += 1;
            prop_assert_eq!(record.value().node(), Some(id));
            let user = module.node(record.user());
            prop_assert!(user.is_some(), "record names missing user {}", record.user());
            let user = user.unwrap();
            let held = match record.slot() {
                OperandSlot::Input(idx) => user.nth_input(idx as usize),
                OperandSlot::Predicate => user.predicate(),
            };
            prop_assert_eq!(held, record.value());
        }
    }
    prop_assert_eq!(connected, records);
    Ok(())
}

proptest! {
    #[test]
    fn use_lists_mirror_operand_slots(ops in proptest::collection::vec(op(), 0..64)) {
        let (mut module, _, ids) = build();
        for op in &ops {
            apply(&mut module, &ids, op);
            check_symmetry(&module, &ids)?;
        }
    }

    #[test]
    fn teardown_in_any_order(
        ops in proptest::collection::vec(op(), 0..32),
        order in Just((0..NODES).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let (mut module, f, ids) = build();
        for op in &ops {
            apply(&mut module, &ids, op);
        }
        for idx in order {
            module.erase_node(f, ids[idx]).unwrap();
            check_symmetry(&module, &ids)?;
        }
        prop_assert_eq!(module.node_count(), 0);
    }
}
