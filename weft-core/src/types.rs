//! Tensor Types
//!
//! Result slots of a node carry a [`TypeRef`]. The graph core treats types as
//! opaque values compared by equality; it only looks inside them to forward
//! [`Type::elem_kind`] and [`Type::dims`] and to check that a predicate is a
//! boolean signal.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemKind {
    Float,
    Float16,
    Int8Q,
    Int32,
    Int64,
    Bool,
}

impl ElemKind {
    /// Get the size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            ElemKind::Float | ElemKind::Int32 => 4,
            ElemKind::Float16 => 2,
            ElemKind::Int8Q | ElemKind::Bool => 1,
            ElemKind::Int64 => 8,
        }
    }

    /// Check if this is an index-like integer type.
    pub fn is_index(&self) -> bool {
        matches!(self, ElemKind::Int32 | ElemKind::Int64)
    }
}

/// A tensor type: element kind plus static dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    elem: ElemKind,
    dims: SmallVec<[usize; 6]>,
}

/// Shared handle to a type. Result slots hold these.
pub type TypeRef = Arc<Type>;

impl Type {
    /// Create a new tensor type.
    pub fn new(elem: ElemKind, dims: &[usize]) -> Self {
        Self {
            elem,
            dims: SmallVec::from_slice(dims),
        }
    }

    /// Create a new tensor type wrapped in a [`TypeRef`].
    pub fn shared(elem: ElemKind, dims: &[usize]) -> TypeRef {
        Arc::new(Self::new(elem, dims))
    }

    pub fn elem_kind(&self) -> ElemKind {
        self.elem
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Check if both types have the same dimensions, ignoring element kind.
    pub fn same_shape(&self, other: &Type) -> bool {
        self.dims == other.dims
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}<", self.elem)?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, ">")
    }
}
