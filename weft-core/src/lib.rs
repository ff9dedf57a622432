//! Weft Core
//!
//! This crate provides the dataflow graph that the Weft tensor compiler's
//! passes and backends are built on. It implements:
//!
//! - Nodes with typed results, operands and an optional predicate
//! - Use-def tracking that stays consistent across every rewrite
//! - Functions owning ordered node lists, with cross-function transfer
//! - Depth-first walkers and verification
//!
//! # Architecture
//!
//! - `graph`: nodes, values, use lists, functions and the owning module
//! - `types`: the tensor type descriptors attached to node results
//! - `error`: owner-level errors and verification diagnostics
//!
//! # Example
//!
//! ```rust
//! use weft_core::graph::{Module, Node, NodeKind, NodeValue};
//! use weft_core::types::{ElemKind, Type};
//!
//! let mut module = Module::new();
//! let main = module.create_function("main");
//! let ty = Type::shared(ElemKind::Float, &[8]);
//!
//! let x = module
//!     .add_node(main, Node::new(NodeKind::Placeholder, "x").with_result(ty.clone()))
//!     .unwrap();
//! let relu = Node::new(NodeKind::Relu, "relu")
//!     .with_input(NodeValue::new(x, 0))
//!     .with_result(ty);
//! let relu = module.add_node(main, relu).unwrap();
//!
//! assert!(module.has_one_use(NodeValue::new(x, 0)));
//! assert!(module.verify_function(main));
//!
//! module.erase_node(main, x).unwrap();
//! assert!(module.node(relu).unwrap().nth_input(0).is_null());
//! ```

pub mod error;
pub mod graph;
pub mod types;

pub use error::{GraphError, VerifyError};
