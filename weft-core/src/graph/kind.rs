//! Node Kinds
//!
//! All nodes share one representation ([`Node`](super::Node)); what differs
//! between operations is captured here. [`NodeKind::info`] is the dispatch
//! table consulted by verification, cloning and structural comparison:
//! input and result names, arity, and the side-effect / arithmetic traits.
//! [`check_kind_rules`] holds the per-kind structural checks.

use strum::{Display, EnumIter, IntoStaticStr};

use crate::types::{ElemKind, Type, TypeRef};

/// The operation a node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum NodeKind {
    /// A graph input or weight, filled from outside.
    Placeholder,
    /// A constant tensor.
    Constant,
    /// A tensor with every element set to one value.
    Splat,
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
    /// Elementwise `lhs <= rhs`, producing a boolean tensor.
    CmpLte,
    Relu,
    Sigmoid,
    Tanh,
    MatMul,
    /// Elementwise `cond ? lhs : rhs`.
    Select,
    /// Concatenation of a variable number of inputs.
    Concat,
    /// Largest-k values and their indices.
    TopK,
    /// Copy `Input` into the storage named by `Output`.
    Save,
}

/// Static description of a node kind.
#[derive(Debug)]
pub struct KindInfo {
    /// Input names, in operand order.
    pub inputs: &'static [&'static str],
    /// When set, the last input may repeat: the node takes at least
    /// `inputs.len()` operands.
    pub variadic: bool,
    /// Result names, in result order.
    pub results: &'static [&'static str],
    pub side_effects: bool,
    pub arithmetic: bool,
    /// Inputs whose storage the node writes to.
    pub overwritten: &'static [usize],
}

static SOURCE: KindInfo = KindInfo {
    inputs: &[],
    variadic: false,
    results: &["Output"],
    side_effects: false,
    arithmetic: false,
    overwritten: &[],
};

static BINARY_ARITHMETIC: KindInfo = KindInfo {
    inputs: &["LHS", "RHS"],
    variadic: false,
    results: &["Result"],
    side_effects: false,
    arithmetic: true,
    overwritten: &[],
};

static COMPARE: KindInfo = KindInfo {
    inputs: &["LHS", "RHS"],
    variadic: false,
    results: &["Result"],
    side_effects: false,
    arithmetic: false,
    overwritten: &[],
};

static UNARY: KindInfo = KindInfo {
    inputs: &["Input"],
    variadic: false,
    results: &["Result"],
    side_effects: false,
    arithmetic: true,
    overwritten: &[],
};

static MATMUL: KindInfo = KindInfo {
    inputs: &["LHS", "RHS"],
    variadic: false,
    results: &["Result"],
    side_effects: false,
    arithmetic: false,
    overwritten: &[],
};

static SELECT: KindInfo = KindInfo {
    inputs: &["Cond", "LHS", "RHS"],
    variadic: false,
    results: &["Result"],
    side_effects: false,
    arithmetic: false,
    overwritten: &[],
};

static CONCAT: KindInfo = KindInfo {
    inputs: &["Inputs"],
    variadic: true,
    results: &["Result"],
    side_effects: false,
    arithmetic: false,
    overwritten: &[],
};

static TOPK: KindInfo = KindInfo {
    inputs: &["Input"],
    variadic: false,
    results: &["Values", "Indices"],
    side_effects: false,
    arithmetic: false,
    overwritten: &[],
};

static SAVE: KindInfo = KindInfo {
    inputs: &["Input", "Output"],
    variadic: false,
    results: &[],
    side_effects: true,
    arithmetic: false,
    overwritten: &[1],
};

impl NodeKind {
    /// Get the static description of this kind.
    pub fn info(&self) -> &'static KindInfo {
        match self {
            NodeKind::Placeholder | NodeKind::Constant | NodeKind::Splat => &SOURCE,
            NodeKind::Add
            | NodeKind::Sub
            | NodeKind::Mul
            | NodeKind::Div
            | NodeKind::Max
            | NodeKind::Min => &BINARY_ARITHMETIC,
            NodeKind::CmpLte => &COMPARE,
            NodeKind::Relu | NodeKind::Sigmoid | NodeKind::Tanh => &UNARY,
            NodeKind::MatMul => &MATMUL,
            NodeKind::Select => &SELECT,
            NodeKind::Concat => &CONCAT,
            NodeKind::TopK => &TOPK,
            NodeKind::Save => &SAVE,
        }
    }

    /// Check if `count` operands is an acceptable arity.
    pub fn accepts_inputs(&self, count: usize) -> bool {
        let info = self.info();
        if info.variadic {
            count >= info.inputs.len()
        } else {
            count == info.inputs.len()
        }
    }

    /// Human-readable arity, for diagnostics.
    pub fn arity_description(&self) -> String {
        let info = self.info();
        if info.variadic {
            format!("at least {}", info.inputs.len())
        } else {
            info.inputs.len().to_string()
        }
    }

    /// Name of input `idx`. Repeated variadic inputs are numbered.
    pub fn input_name(&self, idx: usize) -> String {
        let info = self.info();
        match info.inputs.get(idx) {
            Some(name) if !info.variadic || idx + 1 < info.inputs.len() => name.to_string(),
            _ if info.variadic => {
                let last = info.inputs.len() - 1;
                format!("{}{}", info.inputs[last], idx - last)
            }
            _ => panic!("{} has no input {}", self, idx),
        }
    }

    /// Name of result `idx`.
    pub fn output_name(&self, idx: usize) -> &'static str {
        self.info()
            .results
            .get(idx)
            .copied()
            .unwrap_or_else(|| panic!("{} has no result {}", self, idx))
    }
}

/// Types seen by a kind check. `None` marks a missing type or operand;
/// those are reported elsewhere and skipped here.
pub(crate) struct KindCheck<'a> {
    pub inputs: &'a [Option<&'a TypeRef>],
    pub results: &'a [Option<&'a TypeRef>],
}

impl KindCheck<'_> {
    fn input(&self, idx: usize) -> Option<&Type> {
        self.inputs.get(idx).copied().flatten().map(|ty| &**ty)
    }

    fn result(&self, idx: usize) -> Option<&Type> {
        self.results.get(idx).copied().flatten().map(|ty| &**ty)
    }
}

/// Run the structural rules specific to `kind`, returning one message per
/// violation.
pub(crate) fn check_kind_rules(kind: NodeKind, check: &KindCheck<'_>) -> Vec<String> {
    let mut problems = Vec::new();
    match kind {
        NodeKind::Placeholder | NodeKind::Constant | NodeKind::Splat => {}

        NodeKind::Add
        | NodeKind::Sub
        | NodeKind::Mul
        | NodeKind::Div
        | NodeKind::Max
        | NodeKind::Min
        | NodeKind::Relu
        | NodeKind::Sigmoid
        | NodeKind::Tanh => {
            if let Some(result) = check.result(0) {
                for idx in 0..check.inputs.len() {
                    if let Some(input) = check.input(idx) {
                        if input != result {
                            problems.push(format!(
                                "input {} has type {}, result has type {}",
                                idx, input, result
                            ));
                        }
                    }
                }
            }
        }

        NodeKind::CmpLte => {
            if let (Some(lhs), Some(rhs)) = (check.input(0), check.input(1)) {
                if lhs != rhs {
                    problems.push(format!("operand types differ: {} vs {}", lhs, rhs));
                }
            }
            if let Some(result) = check.result(0) {
                if result.elem_kind() != ElemKind::Bool {
                    problems.push(format!("result must be boolean, found {}", result));
                }
                if let Some(lhs) = check.input(0) {
                    if !lhs.same_shape(result) {
                        problems.push("result shape differs from operand shape".to_string());
                    }
                }
            }
        }

        NodeKind::MatMul => {
            if let (Some(lhs), Some(rhs)) = (check.input(0), check.input(1)) {
                if lhs.dims().len() != 2 || rhs.dims().len() != 2 {
                    problems.push("operands must be rank 2".to_string());
                } else if lhs.dims()[1] != rhs.dims()[0] {
                    problems.push(format!(
                        "inner dimensions differ: {} vs {}",
                        lhs.dims()[1],
                        rhs.dims()[0]
                    ));
                } else if let Some(result) = check.result(0) {
                    if result.dims() != [lhs.dims()[0], rhs.dims()[1]] {
                        problems.push(format!("result type {} does not match operands", result));
                    }
                }
                if lhs.elem_kind() != rhs.elem_kind() {
                    problems.push("operand element kinds differ".to_string());
                }
            }
        }

        NodeKind::Select => {
            if let Some(cond) = check.input(0) {
                if cond.elem_kind() != ElemKind::Bool {
                    problems.push(format!("condition must be boolean, found {}", cond));
                }
            }
            if let Some(result) = check.result(0) {
                for idx in 1..3 {
                    if let Some(input) = check.input(idx) {
                        if input != result {
                            problems.push(format!(
                                "input {} has type {}, result has type {}",
                                idx, input, result
                            ));
                        }
                    }
                }
                if let Some(cond) = check.input(0) {
                    if !cond.same_shape(result) {
                        problems.push("condition shape differs from result shape".to_string());
                    }
                }
            }
        }

        NodeKind::Concat => {
            let present: Vec<&Type> = (0..check.inputs.len())
                .filter_map(|idx| check.input(idx))
                .collect();
            if let Some(first) = present.first() {
                for other in &present[1..] {
                    if other.elem_kind() != first.elem_kind()
                        || other.dims().len() != first.dims().len()
                    {
                        problems.push(format!("input {} is incompatible with {}", other, first));
                    }
                }
                if let Some(result) = check.result(0) {
                    if result.elem_kind() != first.elem_kind() {
                        problems.push("result element kind differs from inputs".to_string());
                    }
                }
            }
        }

        NodeKind::TopK => {
            if let (Some(input), Some(values)) = (check.input(0), check.result(0)) {
                if input.elem_kind() != values.elem_kind() {
                    problems.push("values element kind differs from input".to_string());
                }
            }
            if let Some(indices) = check.result(1) {
                if !indices.elem_kind().is_index() {
                    problems.push(format!("indices must be an index type, found {}", indices));
                }
            }
        }

        NodeKind::Save => {
            if let (Some(input), Some(output)) = (check.input(0), check.input(1)) {
                if input != output {
                    problems.push(format!("cannot save {} into {}", input, output));
                }
            }
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_kind_has_results_or_side_effects() {
        for kind in NodeKind::iter() {
            let info = kind.info();
            assert!(
                !info.results.is_empty() || info.side_effects,
                "{} produces nothing and does nothing",
                kind
            );
            for &idx in info.overwritten {
                assert!(idx < info.inputs.len());
            }
        }
    }

    #[test]
    fn arity() {
        assert!(NodeKind::Add.accepts_inputs(2));
        assert!(!NodeKind::Add.accepts_inputs(3));
        assert!(!NodeKind::Concat.accepts_inputs(0));
        assert!(NodeKind::Concat.accepts_inputs(5));
        assert_eq!(NodeKind::Concat.arity_description(), "at least 1");
    }

    #[test]
    fn names() {
        assert_eq!(NodeKind::Select.input_name(0), "Cond");
        assert_eq!(NodeKind::Concat.input_name(3), "Inputs3");
        assert_eq!(NodeKind::TopK.output_name(1), "Indices");
        let name: &'static str = NodeKind::MatMul.into();
        assert_eq!(name, "MatMul");
    }

    #[test]
    #[should_panic]
    fn missing_input_name_panics() {
        NodeKind::Relu.input_name(1);
    }

    #[test]
    fn arithmetic_rule_flags_mismatched_types() {
        let f = Type::shared(ElemKind::Float, &[4]);
        let i = Type::shared(ElemKind::Int32, &[4]);
        let inputs = [Some(&f), Some(&i)];
        let results = [Some(&f)];
        let problems = check_kind_rules(
            NodeKind::Add,
            &KindCheck {
                inputs: &inputs,
                results: &results,
            },
        );
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn matmul_rule() {
        let lhs = Type::shared(ElemKind::Float, &[2, 3]);
        let rhs = Type::shared(ElemKind::Float, &[3, 5]);
        let good = Type::shared(ElemKind::Float, &[2, 5]);
        let bad = Type::shared(ElemKind::Float, &[5, 2]);

        let inputs = [Some(&lhs), Some(&rhs)];
        let ok = check_kind_rules(
            NodeKind::MatMul,
            &KindCheck {
                inputs: &inputs,
                results: &[Some(&good)],
            },
        );
        assert!(ok.is_empty());

        let wrong = check_kind_rules(
            NodeKind::MatMul,
            &KindCheck {
                inputs: &inputs,
                results: &[Some(&bad)],
            },
        );
        assert_eq!(wrong.len(), 1);
    }
}
