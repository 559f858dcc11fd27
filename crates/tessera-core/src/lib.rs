//! Core intermediate representation, descriptor utilities, and operator traits for Tessera.
//!
//! This crate provides the foundational abstractions the other Tessera crates depend on:
//! - Binding-block IR (`Expr`, `Binding`, `Function`, `IrModule`)
//! - Tensor value descriptors (`StructInfo`, `TensorDesc`) and symbolic dimensions
//! - Descriptor utilities shared by every operator's inference callback
//! - Operator and Pass traits for extensibility
//! - Block builder and expression mutator used by passes and legalization callbacks

pub mod broadcast;
pub mod descriptor;
pub mod ir;
pub mod ir_builder;
pub mod layout;
pub mod mutator;
pub mod operator;
pub mod pass;
pub mod prim_func;
pub mod registry;
pub mod symbolic_expr;
pub mod types;

// Re-export commonly used types
pub use broadcast::infer_broadcast_shape;
pub use descriptor::{
    complete_padding_2d, infer_binary_dtype, infer_unary, input_tensor_descs, normalize_axes,
    normalize_axis,
};
pub use ir::{
    AttrValue, Attrs, Binding, BindingBlock, CALL_TIR_OP, Call, Callee, Expr, ExprKind,
    Function, IrModule, ModuleFunc, SeqExpr, Var,
};
pub use ir_builder::BlockBuilder;
pub use layout::{BijectiveLayout, Layout, check_layout_convertible, check_rank_and_extract_shape};
pub use mutator::ExprMutator;
pub use operator::{ArgSpec, LegalizeFn, Operator};
pub use pass::{Pass, Stage};
pub use prim_func::{HeapExpr, HeapStmt, PrimFunc};
pub use registry::OperatorRegistry;
pub use symbolic_expr::SymbolicExpr;
pub use types::{DataType, StructInfo, TensorDesc, TensorShape};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tessera-core operations.
///
/// Kinds raised while checking an operator invocation carry the offending
/// call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{call}: operator expects {expected} input(s), got {actual}")]
    ArityMismatch {
        call: Box<Call>,
        expected: usize,
        actual: usize,
    },

    #[error("{call}: input {index} must be a Tensor, found {found}")]
    TypeMismatch {
        call: Box<Call>,
        index: usize,
        found: &'static str,
    },

    #[error("{call}: {message}")]
    DtypeMismatch { call: Box<Call>, message: String },

    #[error("{call}: cannot broadcast dimension {dim}: {lhs} vs {rhs}")]
    ShapeBroadcastError {
        call: Box<Call>,
        dim: usize,
        lhs: i64,
        rhs: i64,
    },

    #[error("{call}: layout {layout} has {expected} axes but the input has rank {actual}")]
    ShapeRankMismatch {
        call: Box<Call>,
        layout: String,
        expected: usize,
        actual: usize,
    },

    #[error("{call}: axis {axis} is out of range for rank {ndim}")]
    AxisOutOfRange {
        call: Box<Call>,
        axis: i64,
        ndim: usize,
    },

    #[error("{call}: axis {axis} appears more than once")]
    DuplicateAxis { call: Box<Call>, axis: usize },

    #[error("{call}: padding must have length 1, 2 or 4, got {len}")]
    InvalidPaddingLength { call: Box<Call>, len: usize },

    #[error("{call}: layout {source_layout} cannot be converted to {target_layout}")]
    IncompatibleLayout {
        call: Box<Call>,
        source_layout: String,
        target_layout: String,
    },

    #[error("no legalization is registered for operator '{op}'")]
    MissingLegalization { op: String },

    #[error("symbolic expression '{0}' has no heap slot")]
    UnresolvedSlot(SymbolicExpr),

    #[error("Attribute error: {0}")]
    Attribute(String),

    #[error("Invalid IR: {0}")]
    InvalidIr(String),

    #[error("Symbolic expression error: {0}")]
    Symbolic(String),
}

impl Error {
    /// The call this error is attached to, if any.
    pub fn call(&self) -> Option<&Call> {
        match self {
            Error::ArityMismatch { call, .. }
            | Error::TypeMismatch { call, .. }
            | Error::DtypeMismatch { call, .. }
            | Error::ShapeBroadcastError { call, .. }
            | Error::ShapeRankMismatch { call, .. }
            | Error::AxisOutOfRange { call, .. }
            | Error::DuplicateAxis { call, .. }
            | Error::InvalidPaddingLength { call, .. }
            | Error::IncompatibleLayout { call, .. } => Some(call),
            _ => None,
        }
    }

    /// Whether compilation can continue after this diagnostic.
    pub fn is_warning(&self) -> bool {
        matches!(self, Error::MissingLegalization { .. })
    }
}
